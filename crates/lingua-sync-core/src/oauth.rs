// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - OAuth implicit-grant flow
//
// Authentication happens in the user's browser; the access token comes
// back through a custom URI scheme callback registered with the OS.

use crate::token::TokenManager;
use crate::types::AppError;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Custom URI scheme prefix the OS hands back to the application
pub const OAUTH_CALLBACK_PREFIX: &str = "linguasync://auth/crowdin/";

const OAUTH_CLIENT_ID: &str = "xQzT3FjNmLr8wAyvKu5D";
const OAUTH_SCOPE: &str = "project";

/// Opens URLs in the user's default browser. A trait so frontends and
/// tests can intercept the hand-off.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), AppError>;
}

/// Default opener using the host's URL handler
pub struct SystemUrlOpener;

impl UrlOpener for SystemUrlOpener {
    fn open(&self, url: &str) -> Result<(), AppError> {
        open::that(url)
            .map_err(|e| AppError::AuthenticationFailed(format!("Failed to open browser: {}", e)))
    }
}

/// One in-flight authentication request awaiting its browser callback
struct PendingAuth {
    state: String,
    done: oneshot::Sender<()>,
}

/// Drives the implicit-grant handshake. At most one request is pending
/// at a time; it resolves when a callback with a matching state nonce
/// arrives.
pub(crate) struct OAuthFlow {
    accounts_url: String,
    opener: Arc<dyn UrlOpener>,
    pending: Mutex<Option<PendingAuth>>,
}

impl OAuthFlow {
    pub(crate) fn new(accounts_url: String, opener: Arc<dyn UrlOpener>) -> Self {
        Self {
            accounts_url,
            opener,
            pending: Mutex::new(None),
        }
    }

    /// Open the authorization page and wait for the matching callback.
    /// Starting a new flow supersedes any pending one; the superseded
    /// future fails.
    pub(crate) async fn authenticate(&self) -> Result<(), AppError> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = self.authorization_url(&state);
        let (done_tx, done_rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().unwrap();
            if pending
                .replace(PendingAuth {
                    state,
                    done: done_tx,
                })
                .is_some()
            {
                tracing::warn!("Discarding previously pending authentication request");
            }
        }

        tracing::info!("Opening Crowdin authorization page in browser");
        if let Err(e) = self.opener.open(&url) {
            self.pending.lock().unwrap().take();
            return Err(e);
        }

        done_rx.await.map_err(|_| {
            AppError::AuthenticationFailed("Authentication request was superseded".to_string())
        })
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}/oauth/authorize?response_type=token&scope={}&client_id={}&state={}&redirect_uri={}",
            self.accounts_url, OAUTH_SCOPE, OAUTH_CLIENT_ID, state, OAUTH_CALLBACK_PREFIX
        )
    }

    /// True for URIs on the registered callback scheme
    pub(crate) fn is_oauth_callback(uri: &str) -> bool {
        uri.starts_with(OAUTH_CALLBACK_PREFIX)
    }

    /// Route a callback URI to the pending request, if any.
    ///
    /// Spoofed, stale, malformed, or foreign callbacks are dropped with
    /// no observable effect; a rejected callback must be
    /// indistinguishable from one that never arrived.
    pub(crate) fn handle_oauth_callback(&self, uri: &str, tokens: &TokenManager) {
        let mut slot = self.pending.lock().unwrap();

        let Some(pending) = slot.as_ref() else {
            tracing::debug!("OAuth callback with no pending request, ignoring");
            return;
        };
        let Some(state) = extract_uri_param(uri, "state") else {
            return;
        };
        if state != pending.state {
            tracing::debug!("OAuth callback state mismatch, ignoring");
            return;
        }
        let Some(access_token) = extract_uri_param(uri, "access_token") else {
            return;
        };

        tracing::info!("Crowdin authentication callback accepted");
        if let Err(e) = tokens.save_and_set_token(&access_token) {
            // The token is applied to the transport either way; only
            // persistence across restarts is lost.
            tracing::warn!("Failed to persist Crowdin token: {}", e);
        }

        if let Some(pending) = slot.take() {
            let _ = pending.done.send(());
        }
    }
}

/// Extract a parameter value by raw substring match.
///
/// Implicit-grant parameters arrive inside a URI fragment, which general
/// URI parsers are not guaranteed to expose, so the value is cut straight
/// out of the string. A name match must sit at a parameter boundary and
/// carry a non-empty value.
fn extract_uri_param(uri: &str, name: &str) -> Option<String> {
    let needle = format!("{}=", name);
    let mut search = uri;

    while let Some(idx) = search.find(&needle) {
        let at_boundary =
            idx == 0 || matches!(search.as_bytes()[idx - 1], b'?' | b'&' | b'#' | b'/');
        let rest = &search[idx + needle.len()..];

        if at_boundary {
            let end = rest.find(['&', '#']).unwrap_or(rest.len());
            let value = &rest[..end];
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }

        search = rest;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_oauth_callback_prefix_match() {
        assert!(OAuthFlow::is_oauth_callback(
            "linguasync://auth/crowdin/#state=abc&access_token=tok"
        ));
        assert!(!OAuthFlow::is_oauth_callback("linguasync://open/file"));
        assert!(!OAuthFlow::is_oauth_callback("https://accounts.crowdin.com/"));
    }

    #[test]
    fn test_extract_param_from_fragment() {
        let uri = "linguasync://auth/crowdin/#access_token=tok123&token_type=bearer&state=abc";
        assert_eq!(
            extract_uri_param(uri, "access_token"),
            Some("tok123".to_string())
        );
        assert_eq!(extract_uri_param(uri, "state"), Some("abc".to_string()));
    }

    #[test]
    fn test_extract_param_from_query() {
        let uri = "linguasync://auth/crowdin/?state=abc&access_token=tok123";
        assert_eq!(extract_uri_param(uri, "state"), Some("abc".to_string()));
        assert_eq!(
            extract_uri_param(uri, "access_token"),
            Some("tok123".to_string())
        );
    }

    #[test]
    fn test_extract_param_requires_boundary() {
        // "xstate" must not satisfy a lookup for "state"
        let uri = "linguasync://auth/crowdin/#xstate=wrong&state=right";
        assert_eq!(extract_uri_param(uri, "state"), Some("right".to_string()));
    }

    #[test]
    fn test_extract_param_missing_or_empty() {
        assert_eq!(
            extract_uri_param("linguasync://auth/crowdin/#state=abc", "access_token"),
            None
        );
        assert_eq!(
            extract_uri_param("linguasync://auth/crowdin/#state=&access_token=t", "state"),
            None
        );
    }

    #[test]
    fn test_authorization_url_shape() {
        let flow = OAuthFlow::new(
            "https://accounts.crowdin.com".to_string(),
            Arc::new(SystemUrlOpener),
        );
        let url = flow.authorization_url("nonce123");
        assert!(url.starts_with("https://accounts.crowdin.com/oauth/authorize?"));
        assert!(url.contains("response_type=token"));
        assert!(url.contains("scope=project"));
        assert!(url.contains("state=nonce123"));
        assert!(url.contains(&format!("redirect_uri={}", OAUTH_CALLBACK_PREFIX)));
    }
}
