use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Token counts accumulated by one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Default)]
struct Counters {
    input: AtomicU64,
    output: AtomicU64,
    total: AtomicU64,
}

/// Handle on one request's token counters.
///
/// The middleware keeps a clone so it can read the counters after the
/// handler future has completed and the task-local scope is gone.
#[derive(Debug, Clone, Default)]
pub struct TokenScope(Arc<Counters>);

impl TokenScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.0.input.load(Ordering::Relaxed),
            output_tokens: self.0.output.load(Ordering::Relaxed),
            total_tokens: self.0.total.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.set(TokenUsage::default());
    }

    fn add(&self, input: u64, output: u64) {
        saturating_add(&self.0.input, input);
        saturating_add(&self.0.output, output);
        saturating_add(&self.0.total, input.saturating_add(output));
    }

    fn set(&self, usage: TokenUsage) {
        self.0.input.store(usage.input_tokens, Ordering::Relaxed);
        self.0.output.store(usage.output_tokens, Ordering::Relaxed);
        self.0.total.store(usage.total_tokens, Ordering::Relaxed);
    }

    /// Run `fut` with this scope installed as the task-local token counter.
    pub async fn run<F: Future>(self, fut: F) -> F::Output {
        TOKEN_USAGE.scope(self, fut).await
    }
}

/// Counters pin at `u64::MAX` instead of wrapping.
fn saturating_add(counter: &AtomicU64, n: u64) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_add(n)));
}

tokio::task_local! {
    static TOKEN_USAGE: TokenScope;
}

/// Add tokens to the current request. `total` grows by `input + output`,
/// saturating at `u64::MAX`.
///
/// Returns `false` outside an instrumented request (including work moved to
/// a `tokio::spawn`ed task, which does not inherit the scope).
pub fn record_token_usage(input_tokens: u64, output_tokens: u64) -> bool {
    TOKEN_USAGE
        .try_with(|s| s.add(input_tokens, output_tokens))
        .is_ok()
}

/// Overwrite the current request's counters, including an explicit total.
pub fn set_token_usage(usage: TokenUsage) -> bool {
    TOKEN_USAGE.try_with(|s| s.set(usage)).is_ok()
}

pub fn current_token_usage() -> Option<TokenUsage> {
    TOKEN_USAGE.try_with(TokenScope::snapshot).ok()
}
