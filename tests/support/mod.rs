//! Local stub authority shared by the integration suites.
//!
//! Each test builds the few routes it needs, binds an ephemeral listener,
//! and points a real gateway at it — no network beyond loopback.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::HeaderMap;

use tickerdesk_client::{ApiGateway, ClientConfig, SessionStore};

/// Records the `Authorization` header of every request it is shown.
#[derive(Clone, Default)]
pub struct AuthLog {
    seen: Arc<Mutex<Vec<Option<String>>>>,
}

impl AuthLog {
    pub fn record(&self, headers: &HeaderMap) {
        let value = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.seen.lock().unwrap().push(value);
    }

    /// The header seen on the most recent request, or `None` if nothing
    /// was recorded yet.
    pub fn last(&self) -> Option<Option<String>> {
        self.seen.lock().unwrap().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

/// Serve the stub router on an ephemeral loopback port and return the base
/// URL, including the `/api` prefix the client expects.
pub async fn serve(app: Router) -> String {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

/// A gateway plus its (shared) session store, pointed at the stub.
pub fn gateway_for(base_url: &str) -> (ApiGateway, SessionStore) {
    let session = SessionStore::new();
    let gateway = ApiGateway::new(ClientConfig::new(base_url), session.clone()).unwrap();
    (gateway, session)
}

/// A gateway pointed at a loopback port nothing listens on, for transport
/// failure paths.
pub fn unreachable_gateway() -> (ApiGateway, SessionStore) {
    let mut config = ClientConfig::new("http://127.0.0.1:1/api");
    config.request_timeout_secs = 2;
    config.connect_timeout_secs = 2;
    let session = SessionStore::new();
    let gateway = ApiGateway::new(config, session.clone()).unwrap();
    (gateway, session)
}
