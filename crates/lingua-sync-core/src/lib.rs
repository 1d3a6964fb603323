// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - Crowdin integration shared by all frontends
//
// This crate provides:
// - CrowdinClient: authentication, project listing, file upload/download
// - CredentialStore: secret storage behind the OS keychain or in memory
// - The OAuth callback plumbing for the custom URI scheme
//
// GUI presentation and catalog parsing live in the frontends; this crate
// only ever sees file extensions and raw bytes.

pub mod client;
pub mod credentials;
pub mod oauth;
mod projects;
mod token;
mod transfer;
pub mod transport;
pub mod types;

pub use client::{ClientConfig, CrowdinClient};
pub use credentials::{CredentialStore, KeyringStore, MemoryStore};
pub use oauth::{SystemUrlOpener, UrlOpener, OAUTH_CALLBACK_PREFIX};
pub use types::{AppError, Language, ProjectFile, ProjectInfo, ProjectListing, UserInfo};
