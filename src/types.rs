//! Wire types for the authority's JSON bodies.
//!
//! Request structs serialize exactly what the endpoint accepts; response
//! structs tolerate passthrough fields the client does not inspect and
//! default the ones older deployments omit.

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// AUTH
// =============================================================================

/// Body for `POST /login`. Both fields are optional: pre-user-system
/// deployments authenticate with a shared password and no username.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl LoginRequest {
    /// Username/password login against the user system.
    #[must_use]
    pub fn with_username(username: &str, password: &str) -> Self {
        Self { username: Some(username.to_string()), password: Some(password.to_string()) }
    }

    /// Legacy shared-password login.
    #[must_use]
    pub fn with_password(password: &str) -> Self {
        Self { username: None, password: Some(password.to_string()) }
    }
}

/// Body for `POST /register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Successful login/registration response carrying the issued credential.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Response of `GET /check_auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Response of `GET /need_login`. Only `require_login` is inspected; the
/// rest of the body passes through untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginPolicy {
    pub require_login: bool,
}

// =============================================================================
// DEPLOYMENT CONFIG
// =============================================================================

/// Response of `GET /config`.
///
/// The gate only reads `user_system_enabled` (the registration exception);
/// the announcement and default API fields are passed through for the
/// settings views. Every field defaults so a minimal or older authority
/// keeps the gate fail-closed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub announcement: String,
    #[serde(default)]
    pub default_api_url: String,
    #[serde(default)]
    pub default_api_model: String,
    #[serde(default)]
    pub default_api_timeout: String,
    #[serde(default)]
    pub user_system_enabled: bool,
    #[serde(default)]
    pub require_login: bool,
}

// =============================================================================
// USER
// =============================================================================

/// User record returned by `/user/profile` and embedded in [`AuthSession`].
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A favorited symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct Favorite {
    pub id: i64,
    pub stock_code: String,
    pub market_type: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

/// Body for `POST /user/favorites`.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteRequest {
    pub stock_code: String,
    pub market_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// One completed analysis run from `/user/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisHistoryItem {
    pub id: i64,
    pub stock_codes: Vec<String>,
    pub market_type: String,
    #[serde(default)]
    pub analysis_days: u32,
    #[serde(default)]
    pub analysis_result: Option<Value>,
    #[serde(default)]
    pub ai_output: Option<String>,
    #[serde(default)]
    pub chart_data: Option<Value>,
    #[serde(default)]
    pub created_at: String,
}

/// Per-user preferences from `GET /user/settings`. An account that never
/// saved settings gets an empty object, hence the blanket defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub default_market_type: String,
    #[serde(default)]
    pub default_analysis_days: u32,
    #[serde(default)]
    pub api_preferences: Value,
    #[serde(default)]
    pub ui_preferences: Value,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Partial update body for `PUT /user/settings`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_market_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_analysis_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_preferences: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_preferences: Option<Value>,
}

// =============================================================================
// SEARCH & ANALYSIS
// =============================================================================

/// One symbol match from the search endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub market_value: Option<f64>,
    #[serde(default)]
    pub price_change: Option<f64>,
}

/// Body for `POST /analyze`. The optional API fields override the
/// deployment defaults for a single run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    pub stock_codes: Vec<String>,
    pub market_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_days: Option<u32>,
}

impl AnalyzeRequest {
    /// Analyze the given symbols on one market with deployment-default
    /// API settings.
    #[must_use]
    pub fn new(stock_codes: Vec<String>, market_type: &str) -> Self {
        Self {
            stock_codes,
            market_type: market_type.to_string(),
            api_url: None,
            api_key: None,
            api_model: None,
            api_timeout: None,
            analysis_days: None,
        }
    }
}

/// Body for `POST /test_api_connection`.
#[derive(Debug, Clone, Serialize)]
pub struct TestApiRequest {
    pub api_url: String,
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_timeout: Option<u32>,
}

/// Result of probing a model API endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TestApiResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status_code: Option<u16>,
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// A chat thread anchored to one analysis history record.
#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub history_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message_count: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// One stored message inside a conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

/// Body for `POST /conversations`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateConversationRequest {
    pub history_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}
