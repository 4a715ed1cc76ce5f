//! Buffered API gateway — the single outbound request/response pipeline.
//!
//! ARCHITECTURE
//! ============
//! Every buffered call funnels through one private pipeline: the stored
//! credential is attached by the shared [`SessionStore`] policy, transport
//! failures become [`ApiError::Transport`], a 401 evicts the credential and
//! becomes [`ApiError::Unauthenticated`], and any other error status has its
//! JSON `detail` message extracted into [`ApiError::Application`]. The 401
//! hook performs no navigation; it only restores the logged-out invariant so
//! the next gate evaluation observes a consistent state.
//!
//! Successful login/registration responses write the issued credential to
//! the store before the result is returned, so there is no observable window
//! where the caller holds a session the store does not reflect.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{ApiError, detail_message};
use crate::guard::RemoteAuthority;
use crate::session::SessionStore;
use crate::stream::StreamingChannel;
use crate::types::{
    AnalysisHistoryItem, AnalyzeRequest, AuthSession, AuthStatus, Conversation, ConversationMessage,
    CreateConversationRequest, DeploymentConfig, Favorite, FavoriteRequest, LoginPolicy, LoginRequest, RegisterRequest,
    SearchResult, SettingsUpdate, TestApiRequest, TestApiResponse, UserProfile, UserSettings,
};

pub struct ApiGateway {
    http: reqwest::Client,
    config: ClientConfig,
    session: SessionStore,
}

impl ApiGateway {
    /// Build the gateway and its bounded-timeout HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] when the TLS/connector setup fails.
    pub fn new(config: ClientConfig, session: SessionStore) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, config, session })
    }

    /// The credential store this gateway reads and maintains.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    // =========================================================================
    // PIPELINE
    // =========================================================================

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = self
            .session
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.session.evict();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("authority rejected the credential; evicted");
            return Err(ApiError::Unauthenticated { message: detail_message(401, &body) });
        }
        if !status.is_success() {
            let code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Application { status: code, message: detail_message(code, &body) });
        }
        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::ResponseParse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(self.http.get(self.config.endpoint(path))).await?;
        Self::parse(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T, ApiError> {
        let response = self
            .execute(self.http.post(self.config.endpoint(path)).json(body))
            .await?;
        Self::parse(response).await
    }

    // =========================================================================
    // AUTH OPERATIONS
    // =========================================================================

    /// `POST /login` — exchange credentials for a session. The issued
    /// credential is stored before this returns.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy; a rejected password
    /// surfaces as [`ApiError::Unauthenticated`].
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession, ApiError> {
        let auth: AuthSession = self.post_json("/login", request).await?;
        self.session.store(auth.access_token.clone());
        Ok(auth)
    }

    /// `POST /register` — create an account; same credential side effect as
    /// [`ApiGateway::login`].
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ApiError> {
        let auth: AuthSession = self.post_json("/register", request).await?;
        self.session.store(auth.access_token.clone());
        Ok(auth)
    }

    /// `POST /logout` — best-effort remote invalidation; local eviction
    /// always proceeds. Idempotent and infallible.
    pub async fn logout(&self) {
        let request = self.session.authorize(self.http.post(self.config.endpoint("/logout")));
        if let Err(e) = request.send().await {
            tracing::debug!(error = %e, "logout request failed; evicting locally anyway");
        }
        self.session.evict();
    }

    /// `GET /check_auth` — whether the stored credential is still accepted.
    /// A definitive `false` evicts the credential, as does a 401 inside the
    /// pipeline, so the gate never re-observes a known-dead session.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn check_auth(&self) -> Result<bool, ApiError> {
        let status: AuthStatus = self.get_json("/check_auth").await?;
        if !status.authenticated {
            self.session.evict();
        }
        Ok(status.authenticated)
    }

    /// `GET /need_login` — whether this deployment requires login at all.
    /// Never cached; the gate re-queries on every protected navigation.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn need_login(&self) -> Result<bool, ApiError> {
        let policy: LoginPolicy = self.get_json("/need_login").await?;
        Ok(policy.require_login)
    }

    /// `GET /config` — deployment configuration.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn fetch_config(&self) -> Result<DeploymentConfig, ApiError> {
        self.get_json("/config").await
    }

    // =========================================================================
    // USER OPERATIONS
    // =========================================================================

    /// `GET /user/profile`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn user_profile(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/user/profile").await
    }

    /// `POST /user/favorites` — returns the server's confirmation message.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn add_favorite(&self, request: &FavoriteRequest) -> Result<String, ApiError> {
        let ack: MessageEnvelope = self.post_json("/user/favorites", request).await?;
        Ok(ack.message)
    }

    /// `DELETE /user/favorites/{stock_code}`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn remove_favorite(&self, stock_code: &str, market_type: &str) -> Result<String, ApiError> {
        let url = self.config.endpoint(&format!("/user/favorites/{stock_code}"));
        let response = self
            .execute(self.http.delete(url).query(&[("market_type", market_type)]))
            .await?;
        let ack: MessageEnvelope = Self::parse(response).await?;
        Ok(ack.message)
    }

    /// `GET /user/favorites`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn favorites(&self) -> Result<Vec<Favorite>, ApiError> {
        let envelope: FavoritesEnvelope = self.get_json("/user/favorites").await?;
        Ok(envelope.favorites)
    }

    /// `GET /user/history?limit=N`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn analysis_history(&self, limit: u32) -> Result<Vec<AnalysisHistoryItem>, ApiError> {
        let url = self.config.endpoint("/user/history");
        let response = self.execute(self.http.get(url).query(&[("limit", limit)])).await?;
        let envelope: HistoryEnvelope = Self::parse(response).await?;
        Ok(envelope.history)
    }

    /// `DELETE /user/history/{history_id}`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn delete_analysis_history(&self, history_id: i64) -> Result<String, ApiError> {
        let url = self.config.endpoint(&format!("/user/history/{history_id}"));
        let response = self.execute(self.http.delete(url)).await?;
        let ack: MessageEnvelope = Self::parse(response).await?;
        Ok(ack.message)
    }

    /// `GET /user/settings`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn settings(&self) -> Result<UserSettings, ApiError> {
        let envelope: SettingsEnvelope = self.get_json("/user/settings").await?;
        Ok(envelope.settings)
    }

    /// `PUT /user/settings`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<String, ApiError> {
        let response = self
            .execute(self.http.put(self.config.endpoint("/user/settings")).json(update))
            .await?;
        let ack: MessageEnvelope = Self::parse(response).await?;
        Ok(ack.message)
    }

    // =========================================================================
    // SEARCH & ANALYSIS
    // =========================================================================

    /// `GET /search_us_stocks?keyword=...`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn search_us_stocks(&self, keyword: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.search("/search_us_stocks", keyword).await
    }

    /// `GET /search_funds?keyword=...`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn search_funds(&self, keyword: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.search("/search_funds", keyword).await
    }

    async fn search(&self, path: &str, keyword: &str) -> Result<Vec<SearchResult>, ApiError> {
        let url = self.config.endpoint(path);
        let response = self.execute(self.http.get(url).query(&[("keyword", keyword)])).await?;
        let envelope: SearchEnvelope = Self::parse(response).await?;
        Ok(envelope.results)
    }

    /// `POST /test_api_connection` — probe a model API endpoint.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn test_api_connection(&self, request: &TestApiRequest) -> Result<TestApiResponse, ApiError> {
        self.post_json("/test_api_connection", request).await
    }

    /// `POST /analyze` — open the streaming channel for a long-running
    /// analysis. Frames are opaque bytes; callers interpret the
    /// newline-delimited status records.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::StreamOpen`] when the handshake is refused,
    /// [`ApiError::Transport`] when no response arrives.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<StreamingChannel, ApiError> {
        StreamingChannel::open(self.http.post(self.config.endpoint("/analyze")).json(request), &self.session).await
    }

    // =========================================================================
    // CONVERSATIONS
    // =========================================================================

    /// `POST /conversations` — returns the new conversation id.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn create_conversation(&self, request: &CreateConversationRequest) -> Result<i64, ApiError> {
        let created: CreatedConversationEnvelope = self.post_json("/conversations", request).await?;
        Ok(created.conversation_id)
    }

    /// `GET /conversations`, optionally filtered by analysis history record.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn conversations(&self, history_id: Option<i64>) -> Result<Vec<Conversation>, ApiError> {
        let mut request = self.http.get(self.config.endpoint("/conversations"));
        if let Some(history_id) = history_id {
            request = request.query(&[("history_id", history_id)]);
        }
        let response = self.execute(request).await?;
        let envelope: ConversationsEnvelope = Self::parse(response).await?;
        Ok(envelope.conversations)
    }

    /// `GET /conversations/{id}/messages`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn conversation_messages(&self, conversation_id: i64) -> Result<Vec<ConversationMessage>, ApiError> {
        let envelope: MessagesEnvelope = self
            .get_json(&format!("/conversations/{conversation_id}/messages"))
            .await?;
        Ok(envelope.messages)
    }

    /// `DELETE /conversations/{id}`.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn delete_conversation(&self, conversation_id: i64) -> Result<String, ApiError> {
        let url = self.config.endpoint(&format!("/conversations/{conversation_id}"));
        let response = self.execute(self.http.delete(url)).await?;
        let ack: MessageEnvelope = Self::parse(response).await?;
        Ok(ack.message)
    }

    /// `GET /conversations/prompts/random` — a suggested opening question.
    ///
    /// # Errors
    ///
    /// Fails with the normalized [`ApiError`] taxonomy.
    pub async fn random_prompt(&self) -> Result<String, ApiError> {
        let envelope: PromptEnvelope = self.get_json("/conversations/prompts/random").await?;
        Ok(envelope.prompt)
    }

    /// `POST /conversations/{id}/messages` — send a chat message and open
    /// the streaming channel for the assistant's incrementally produced
    /// reply.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::StreamOpen`] when the handshake is refused,
    /// [`ApiError::Transport`] when no response arrives.
    pub async fn send_conversation_message(
        &self,
        conversation_id: i64,
        message: &str,
    ) -> Result<StreamingChannel, ApiError> {
        let url = self.config.endpoint(&format!("/conversations/{conversation_id}/messages"));
        let body = serde_json::json!({ "message": message });
        StreamingChannel::open(self.http.post(url).json(&body), &self.session).await
    }
}

// =============================================================================
// REMOTE AUTHORITY
// =============================================================================

#[async_trait]
impl RemoteAuthority for ApiGateway {
    async fn login_required(&self) -> Result<bool, ApiError> {
        self.need_login().await
    }

    async fn deployment_config(&self) -> Result<DeploymentConfig, ApiError> {
        self.fetch_config().await
    }

    async fn session_valid(&self) -> Result<bool, ApiError> {
        self.check_auth().await
    }
}

// =============================================================================
// RESPONSE ENVELOPES
// =============================================================================

#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct FavoritesEnvelope {
    #[serde(default)]
    favorites: Vec<Favorite>,
}

#[derive(Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    history: Vec<AnalysisHistoryItem>,
}

#[derive(Deserialize)]
struct SettingsEnvelope {
    #[serde(default)]
    settings: UserSettings,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct ConversationsEnvelope {
    #[serde(default)]
    conversations: Vec<Conversation>,
}

#[derive(Deserialize)]
struct MessagesEnvelope {
    #[serde(default)]
    messages: Vec<ConversationMessage>,
}

#[derive(Deserialize)]
struct CreatedConversationEnvelope {
    conversation_id: i64,
}

#[derive(Deserialize)]
struct PromptEnvelope {
    #[serde(default)]
    prompt: String,
}
