// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - Crowdin client facade
//
// One explicitly constructed client owns the transport, token lifecycle,
// and OAuth flow. Frontends create it with their credential store and
// browser hand-off; dropping it is its shutdown.

use crate::credentials::CredentialStore;
use crate::oauth::{OAuthFlow, SystemUrlOpener, UrlOpener};
use crate::projects;
use crate::token::TokenManager;
use crate::transfer;
use crate::transport::ApiTransport;
use crate::types::{AppError, Language, ProjectInfo, ProjectListing, UserInfo};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

const NOT_AUTHORIZED_MESSAGE: &str = "Not authorized, please sign in again.";

/// Endpoints the client talks to. Defaults target production Crowdin;
/// tests point everything at a local mock server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Accounts host serving the OAuth authorization pages
    pub accounts_url: String,
    /// Host name the tenant-specific API base is derived from
    pub api_host: String,
    /// API base used before any token-derived rebind
    pub api_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            accounts_url: "https://accounts.crowdin.com".to_string(),
            api_host: "crowdin.com".to_string(),
            api_base_url: "https://crowdin.com/api/v2".to_string(),
        }
    }
}

/// Client for the Crowdin translation-hosting service
pub struct CrowdinClient {
    transport: Arc<ApiTransport>,
    tokens: TokenManager,
    oauth: OAuthFlow,
    accounts_url: String,
}

impl CrowdinClient {
    /// Create a client over `store`, silently signing in if a token was
    /// persisted by an earlier session.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_config(ClientConfig::default(), store, Arc::new(SystemUrlOpener))
    }

    /// Create a client with explicit endpoints and browser hand-off
    pub fn with_config(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        opener: Arc<dyn UrlOpener>,
    ) -> Self {
        let transport = Arc::new(ApiTransport::new(&config.api_base_url));
        let tokens = TokenManager::new(transport.clone(), store, config.api_host);
        let oauth = OAuthFlow::new(config.accounts_url.clone(), opener);

        let client = Self {
            transport,
            tokens,
            oauth,
            accounts_url: config.accounts_url,
        };
        client.tokens.sign_in_if_authorized();
        client
    }

    /// Build a link to a page on the accounts site (sign-up, plans, ...)
    pub fn attention_link(&self, page: &str) -> String {
        format!("{}{}", self.accounts_url, page)
    }

    /// Start the implicit-grant browser flow. Resolves once a matching
    /// callback reaches `handle_oauth_callback`; fails if a newer flow
    /// supersedes this one.
    pub async fn authenticate(&self) -> Result<(), AppError> {
        self.oauth.authenticate().await
    }

    /// True if `uri` belongs to this client's OAuth callback scheme
    pub fn is_oauth_callback(uri: &str) -> bool {
        OAuthFlow::is_oauth_callback(uri)
    }

    /// Feed a callback URI received on the custom scheme. Invalid or
    /// unexpected callbacks are ignored.
    pub fn handle_oauth_callback(&self, uri: &str) {
        self.oauth.handle_oauth_callback(uri, &self.tokens);
    }

    pub fn is_signed_in(&self) -> bool {
        self.tokens.is_signed_in()
    }

    /// Forget the bearer token and delete the persisted credential
    pub fn sign_out(&self) -> Result<(), AppError> {
        tracing::info!("Signing out of Crowdin");
        self.tokens.sign_out()
    }

    /// The API base currently in effect (tenant-dependent once a token
    /// has been applied)
    pub fn api_base_url(&self) -> String {
        self.transport.base_url()
    }

    /// Fetch the authenticated user's profile
    pub async fn get_user_info(&self) -> Result<UserInfo, AppError> {
        let response = self
            .transport
            .get_json("user")
            .await
            .map_err(|e| self.auth_checked(e))?;

        let data = response.get("data").cloned().unwrap_or(Value::Null);
        let login = data
            .get("username")
            .and_then(Value::as_str)
            .ok_or(AppError::MissingField("data.username"))?
            .to_string();
        let name = display_name(&data, &login);

        Ok(UserInfo { login, name })
    }

    /// List the user's projects, excluding those whose files cannot be
    /// listed
    pub async fn get_user_projects(&self) -> Result<Vec<ProjectListing>, AppError> {
        projects::list_user_projects(&self.transport)
            .await
            .map_err(|e| self.auth_checked(e))
    }

    /// Fetch one project's metadata, languages, and resolved file tree
    pub async fn get_project_info(&self, project_id: i64) -> Result<ProjectInfo, AppError> {
        projects::get_project_info(&self.transport, project_id)
            .await
            .map_err(|e| self.auth_checked(e))
    }

    /// Download one file's translation into `output_file`
    pub async fn download_file(
        &self,
        project_id: i64,
        lang: &Language,
        file_id: i64,
        file_extension: &str,
        output_file: &Path,
    ) -> Result<(), AppError> {
        transfer::download_file(
            &self.transport,
            project_id,
            lang,
            file_id,
            file_extension,
            output_file,
        )
        .await
        .map_err(|e| self.auth_checked(e))
    }

    /// Upload `content` as a translation update for one file
    pub async fn upload_file(
        &self,
        project_id: i64,
        lang: &Language,
        file_id: i64,
        file_extension: &str,
        content: Vec<u8>,
    ) -> Result<(), AppError> {
        transfer::upload_file(
            &self.transport,
            project_id,
            lang,
            file_id,
            file_extension,
            content,
        )
        .await
        .map_err(|e| self.auth_checked(e))
    }

    /// Route an API error through the automatic sign-out policy: a 401
    /// invalidates the stored credential before the caller sees the
    /// failure.
    fn auth_checked(&self, err: AppError) -> AppError {
        if let AppError::NotAuthorized(_) = err {
            tracing::warn!("Crowdin API returned 401, signing out");
            if let Err(store_err) = self.tokens.sign_out() {
                tracing::warn!("Failed to clear stored credential: {}", store_err);
            }
            return AppError::NotAuthorized(NOT_AUTHORIZED_MESSAGE.to_string());
        }
        err
    }
}

/// Crowdin may return no `fullName`; fall back to first+last, then to
/// the login.
fn display_name(data: &Value, login: &str) -> String {
    if let Some(full) = data.get("fullName").and_then(Value::as_str) {
        if !full.trim().is_empty() {
            return full.to_string();
        }
    }

    let first = data.get("firstName").and_then(Value::as_str).unwrap_or("");
    let last = data.get("lastName").and_then(Value::as_str).unwrap_or("");
    let combined = format!("{} {}", first, last);
    let combined = combined.trim();

    if combined.is_empty() {
        login.to_string()
    } else {
        combined.to_string()
    }
}
