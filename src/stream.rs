//! Streaming channel — the second transport discipline.
//!
//! Used only for incrementally produced content (analysis output, chat
//! replies). The outbound call carries the same bearer-credential policy as
//! the buffered gateway, but instead of buffering a JSON body the caller
//! drains an ordered sequence of opaque byte frames. Frame boundaries and
//! the newline-delimited status records inside them are interpreted by
//! higher layers, not here.

use bytes::Bytes;
use reqwest::RequestBuilder;

use crate::error::ApiError;
use crate::session::SessionStore;

/// Live handle to one logical streaming response.
///
/// The sequence is consumed at most once and is not restartable: after the
/// server closes it (or a mid-stream failure ends it), every further read
/// yields `None`.
#[derive(Debug)]
pub struct StreamingChannel {
    response: reqwest::Response,
    done: bool,
}

impl StreamingChannel {
    /// Send the request and open the channel.
    ///
    /// The shared credential policy applies: attach the stored credential
    /// if present, proceed unauthenticated otherwise. An unauthenticated
    /// open on the protected endpoints is almost always a caller bug, so it
    /// is logged as a diagnostic.
    ///
    /// # Errors
    ///
    /// [`ApiError::Transport`] when no response arrives;
    /// [`ApiError::StreamOpen`] when the response status is non-success —
    /// the stream is never opened and any textual error body is captured
    /// best-effort.
    pub(crate) async fn open(request: RequestBuilder, session: &SessionStore) -> Result<Self, ApiError> {
        if !session.is_authenticated() {
            tracing::warn!("opening stream without a stored credential");
        }

        let response = session
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::StreamOpen { status: status.as_u16(), body });
        }

        Ok(Self { response, done: false })
    }

    /// The next frame in replay order, or `None` once the stream has ended.
    ///
    /// A mid-stream transport failure ends the sequence (logged, not an
    /// error path): the bytes delivered so far stand, and the channel
    /// behaves as exhausted from then on.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        if self.done {
            return None;
        }
        match self.response.chunk().await {
            Ok(Some(frame)) => Some(frame),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "stream ended on transport failure");
                self.done = true;
                None
            }
        }
    }

    /// Whether the stream has already terminated.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.done
    }
}
