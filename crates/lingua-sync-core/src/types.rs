// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - Type definitions

use serde::Serialize;

/// Error types for the Crowdin core
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    NotAuthorized(String),

    #[error("{0}")]
    Api(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Missing field in API response: {0}")]
    MissingField(&'static str),

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Credential store error: {0}")]
    CredentialStore(String),
}

/// A target language identified by its tag (e.g. "cs", "pt-BR").
///
/// Parsing is best-effort and never fails: the API is the authority on
/// which languages a project has, so even an oddly-formed tag must keep
/// its slot in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Language {
    tag: String,
}

impl Language {
    /// Normalize `tag` into a Language. Underscore separators (locale
    /// style, "pt_BR") are folded into hyphens.
    pub fn parse(tag: &str) -> Self {
        Self {
            tag: tag.trim().replace('_', "-"),
        }
    }

    /// The tag as used in REST paths and request bodies
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag)
    }
}

/// The authenticated Crowdin user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub login: String,
    /// Display name, falling back to the login when the profile has none
    pub name: String,
}

/// One project in the user's project listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListing {
    pub name: String,
    pub id: i64,
}

/// A translatable file with its fully-qualified path within the project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    /// Path of the form `/branch?/dir/.../name`
    pub path: String,
    pub id: i64,
    pub directory_id: Option<i64>,
    pub branch_id: Option<i64>,
}

/// Project metadata with resolved file paths and target languages
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub name: String,
    pub id: i64,
    pub languages: Vec<Language>,
    pub files: Vec<ProjectFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse_normalizes_separators() {
        assert_eq!(Language::parse("pt_BR").tag(), "pt-BR");
        assert_eq!(Language::parse(" cs ").tag(), "cs");
    }

    #[test]
    fn test_language_parse_never_fails() {
        // Garbage tags keep their slot instead of erroring out
        let lang = Language::parse("not a tag!");
        assert_eq!(lang.tag(), "not a tag!");
    }
}
