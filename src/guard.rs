//! Navigation authentication gate.
//!
//! ARCHITECTURE
//! ============
//! Before every protected view transition the routing layer asks the guard
//! for a [`GateDecision`]. The guard reconciles three independent facts —
//! does this deployment require login at all, does a local credential
//! exist, is that credential still accepted — in a fixed short-circuit
//! order, and resolves every intent to `Allow` or `RedirectToLogin` before
//! the transition completes.
//!
//! The policy is fail-closed: any failed remote check counts as
//! insufficient evidence to allow. `Allow` is reachable only through the
//! login view itself, an unprotected route, a deployment that does not
//! require login, the registration exception under enabled multi-user
//! mode, or a credential the authority confirms.
//!
//! TRADE-OFFS
//! ==========
//! Two different intents may have their remote checks in flight at once
//! (rapid back-to-back navigations); evaluations are not serialized across
//! intents, so the last decision to resolve wins and a stale check still
//! applies its side effects. The guard stays stateless and idempotent, so
//! callers needing stronger ordering can tag intents and discard stale
//! decisions themselves.

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::session::SessionStore;
use crate::types::DeploymentConfig;

pub const DEFAULT_LOGIN_PATH: &str = "/login";

// =============================================================================
// DECISION & INTENT
// =============================================================================

/// Outcome of gating one navigation. Never left pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Mount the target view.
    Allow,
    /// Show the login view instead. The reason (missing credential,
    /// rejected credential, failed policy check) is logged, not surfaced.
    RedirectToLogin,
}

/// A pending view transition.
#[derive(Debug, Clone)]
pub struct NavigationIntent {
    /// Target path, compared against the login path for loop prevention.
    pub path: String,
    /// Whether the target route is marked protected.
    pub requires_auth: bool,
    /// Query signal indicating a registration attempt on the target view.
    pub register_signal: bool,
}

impl NavigationIntent {
    #[must_use]
    pub fn new(path: impl Into<String>, requires_auth: bool) -> Self {
        Self { path: path.into(), requires_auth, register_signal: false }
    }

    /// Mark this intent as a registration attempt.
    #[must_use]
    pub fn with_register_signal(mut self) -> Self {
        self.register_signal = true;
        self
    }
}

// =============================================================================
// REMOTE AUTHORITY
// =============================================================================

/// The backend capability the gate depends on. Implemented by
/// [`crate::ApiGateway`]; test doubles implement it directly.
#[async_trait]
pub trait RemoteAuthority {
    /// Whether this deployment requires login system-wide.
    async fn login_required(&self) -> Result<bool, ApiError>;

    /// Current deployment configuration (multi-user mode flag).
    async fn deployment_config(&self) -> Result<DeploymentConfig, ApiError>;

    /// Whether the currently stored credential is still accepted.
    async fn session_valid(&self) -> Result<bool, ApiError>;
}

#[async_trait]
impl<T: RemoteAuthority + Send + Sync> RemoteAuthority for std::sync::Arc<T> {
    async fn login_required(&self) -> Result<bool, ApiError> {
        (**self).login_required().await
    }

    async fn deployment_config(&self) -> Result<DeploymentConfig, ApiError> {
        (**self).deployment_config().await
    }

    async fn session_valid(&self) -> Result<bool, ApiError> {
        (**self).session_valid().await
    }
}

// =============================================================================
// GUARD
// =============================================================================

/// The gate itself: an authority, the shared credential store, and the
/// login path that must never be gated.
pub struct NavigationGuard<A> {
    authority: A,
    session: SessionStore,
    login_path: String,
}

impl<A: RemoteAuthority> NavigationGuard<A> {
    #[must_use]
    pub fn new(authority: A, session: SessionStore) -> Self {
        Self { authority, session, login_path: DEFAULT_LOGIN_PATH.to_string() }
    }

    /// Override the login view path (default `/login`).
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Resolve the decision for one pending navigation.
    ///
    /// Steps run in fixed order and short-circuit; each remote call is a
    /// suspension point. Evaluating the same intent twice against unchanged
    /// remote state yields the same decision.
    pub async fn decide(&self, intent: &NavigationIntent) -> GateDecision {
        tracing::debug!(path = %intent.path, "gating navigation");

        // The login view is never gated, or redirecting to it would loop.
        if intent.path == self.login_path {
            return GateDecision::Allow;
        }

        if !intent.requires_auth {
            tracing::debug!(path = %intent.path, "route not protected");
            return GateDecision::Allow;
        }

        // A failed policy check counts as "login required".
        let required = match self.authority.login_required().await {
            Ok(required) => required,
            Err(e) => {
                tracing::warn!(error = %e, "login-required check failed; treating as required");
                true
            }
        };
        if !required {
            tracing::debug!(path = %intent.path, "deployment does not require login");
            return GateDecision::Allow;
        }

        if !self.session.is_authenticated() {
            if intent.register_signal {
                // Registration is only reachable when the deployment
                // confirms multi-user mode right now; the target view
                // performs the registration itself.
                match self.authority.deployment_config().await {
                    Ok(config) if config.user_system_enabled => {
                        tracing::debug!(path = %intent.path, "registration attempt allowed");
                        return GateDecision::Allow;
                    }
                    Ok(_) => {
                        tracing::debug!("registration refused: multi-user mode disabled");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "deployment config re-query failed");
                    }
                }
            }
            tracing::debug!(path = %intent.path, "no stored credential");
            return GateDecision::RedirectToLogin;
        }

        // Credential present: the authority has the last word. Eviction of
        // a rejected credential happens inside the gateway's response
        // handling, not here.
        match self.authority.session_valid().await {
            Ok(true) => GateDecision::Allow,
            Ok(false) => {
                tracing::debug!(path = %intent.path, "credential no longer accepted");
                GateDecision::RedirectToLogin
            }
            Err(e) => {
                tracing::warn!(error = %e, "session validity check failed");
                GateDecision::RedirectToLogin
            }
        }
    }
}
