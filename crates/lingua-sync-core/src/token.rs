// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - Bearer token lifecycle
//
// Applies tokens to the transport, derives the tenant-specific API base
// from the token payload, and persists tokens in the credential store.

use crate::credentials::CredentialStore;
use crate::transport::ApiTransport;
use crate::types::AppError;
use base64::Engine;
use std::sync::Arc;

/// Fixed credential-store key for the Crowdin bearer token
pub(crate) const TOKEN_SERVICE: &str = "Crowdin";
pub(crate) const TOKEN_ACCOUNT: &str = "bearer-token";

pub(crate) struct TokenManager {
    transport: Arc<ApiTransport>,
    store: Arc<dyn CredentialStore>,
    /// Host the API base is derived from ("crowdin.com" in production)
    api_host: String,
}

impl TokenManager {
    pub(crate) fn new(
        transport: Arc<ApiTransport>,
        store: Arc<dyn CredentialStore>,
        api_host: String,
    ) -> Self {
        Self {
            transport,
            store,
            api_host,
        }
    }

    /// Re-apply a previously persisted token. Store failures are
    /// non-fatal: the client simply starts unauthenticated.
    pub(crate) fn sign_in_if_authorized(&self) {
        match self.store.get(TOKEN_SERVICE, TOKEN_ACCOUNT) {
            Ok(Some(token)) => {
                tracing::debug!("Found persisted Crowdin token, signing in");
                self.set_token(&token);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Credential store lookup failed, starting unauthenticated: {}", e);
            }
        }
    }

    /// Bind `token` to the transport and derive the API base from its
    /// payload. Enterprise tokens carry a `domain` claim selecting a
    /// tenant subdomain; everything else lands on the main host. An
    /// empty token is a no-op.
    pub(crate) fn set_token(&self, token: &str) {
        if token.is_empty() {
            return;
        }

        let base_url = match token_domain(token) {
            Some(domain) => format!("https://{}.{}/api/v2", domain, self.api_host),
            None => format!("https://{}/api/v2", self.api_host),
        };

        tracing::debug!("Binding Crowdin API transport to {}", base_url);
        self.transport.rebind(&base_url, Some(token.to_string()));
    }

    /// Apply `token` and persist it for future sessions
    pub(crate) fn save_and_set_token(&self, token: &str) -> Result<(), AppError> {
        self.set_token(token);
        self.store.set(TOKEN_SERVICE, TOKEN_ACCOUNT, token)
    }

    /// Drop the transport authorization and delete the persisted token
    pub(crate) fn sign_out(&self) -> Result<(), AppError> {
        self.transport.clear_authorization();
        self.store.delete(TOKEN_SERVICE, TOKEN_ACCOUNT)
    }

    pub(crate) fn is_signed_in(&self) -> bool {
        matches!(self.store.get(TOKEN_SERVICE, TOKEN_ACCOUNT), Ok(Some(_)))
    }
}

/// Extract the optional `domain` claim from the payload segment of a
/// signed token. Any decode or parse failure yields `None`; tokens
/// without a domain belong to the main host.
fn token_domain(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = decode_base64_forgiving(payload)?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims
        .get("domain")?
        .as_str()
        .filter(|domain| !domain.is_empty())
        .map(str::to_string)
}

// Token payloads are base64url without padding, but be lenient about
// the alphabet since the issuer is not under our control.
fn decode_base64_forgiving(payload: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};

    URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .or_else(|| STANDARD_NO_PAD.decode(payload).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryStore;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn forge_token(payload_json: &str) -> String {
        format!("header.{}.signature", URL_SAFE_NO_PAD.encode(payload_json))
    }

    fn manager_over(store: Arc<MemoryStore>) -> (Arc<ApiTransport>, TokenManager) {
        let transport = Arc::new(ApiTransport::new("https://crowdin.com/api/v2"));
        let manager = TokenManager::new(transport.clone(), store, "crowdin.com".to_string());
        (transport, manager)
    }

    #[test]
    fn test_domain_claim_selects_tenant_host() {
        assert_eq!(
            token_domain(&forge_token(r#"{"domain":"acme"}"#)),
            Some("acme".to_string())
        );
    }

    #[test]
    fn test_missing_or_empty_domain_means_main_host() {
        assert_eq!(token_domain(&forge_token(r#"{"sub":"42"}"#)), None);
        assert_eq!(token_domain(&forge_token(r#"{"domain":""}"#)), None);
        assert_eq!(token_domain(&forge_token(r#"{"domain":null}"#)), None);
    }

    #[test]
    fn test_malformed_tokens_default_to_main_host() {
        assert_eq!(token_domain("no-dots-here"), None);
        assert_eq!(token_domain("a.!!!not-base64!!!.c"), None);
        assert_eq!(
            token_domain(&format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"))),
            None
        );
    }

    #[test]
    fn test_set_token_rebinds_transport_to_tenant() {
        let store = Arc::new(MemoryStore::new());
        let (transport, manager) = manager_over(store);

        manager.set_token(&forge_token(r#"{"domain":"acme"}"#));
        assert_eq!(transport.base_url(), "https://acme.crowdin.com/api/v2");

        manager.set_token(&forge_token(r#"{"sub":"42"}"#));
        assert_eq!(transport.base_url(), "https://crowdin.com/api/v2");
    }

    #[test]
    fn test_persisted_token_survives_restart() {
        let store = Arc::new(MemoryStore::new());
        let token = forge_token(r#"{"domain":"acme"}"#);

        let (first_transport, first) = manager_over(store.clone());
        first.save_and_set_token(&token).unwrap();
        assert!(first.is_signed_in());

        // A fresh manager over the same store mimics a process restart
        let (second_transport, second) = manager_over(store);
        second.sign_in_if_authorized();
        assert!(second.is_signed_in());
        assert_eq!(second_transport.base_url(), first_transport.base_url());
    }

    #[test]
    fn test_sign_out_forgets_token() {
        let store = Arc::new(MemoryStore::new());
        let (_, manager) = manager_over(store.clone());

        manager.save_and_set_token(&forge_token(r#"{}"#)).unwrap();
        assert!(manager.is_signed_in());

        manager.sign_out().unwrap();
        assert!(!manager.is_signed_in());
        assert_eq!(store.get(TOKEN_SERVICE, TOKEN_ACCOUNT).unwrap(), None);
    }
}
