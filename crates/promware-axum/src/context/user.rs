use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User context forwarded by an upstream gateway as a JSON header.
///
/// Every field is optional and unknown fields are ignored: the header is a
/// convenience for downstream handlers and logs, never a validation point.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(rename = "_id", alias = "userId", default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub org_id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub role_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub meta: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub workspace: Vec<Value>,
}

/// Parse the user-context header. Missing or malformed headers yield `None`.
pub fn parse_user_data(headers: &HeaderMap, header: &str) -> Option<UserData> {
    let raw = headers.get(header)?.to_str().ok()?;
    match serde_json::from_str(raw) {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::debug!(header, error = %e, "ignoring unparseable user context header");
            None
        }
    }
}
