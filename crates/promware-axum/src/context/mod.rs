//! Request-scoped context shared between the middleware and handlers.
//!
//! - `token`: task-local LLM token usage, read and cleared at request end
//! - `user`: optional JSON user context carried in a request header

pub mod token;
pub mod user;

pub use token::{current_token_usage, record_token_usage, set_token_usage, TokenScope, TokenUsage};
pub use user::{parse_user_data, UserData};
