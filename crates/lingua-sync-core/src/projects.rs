// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - Project listing and file tree resolution
//
// The API exposes a project's files, directories, and branches as three
// flat ID-keyed collections; resolution stitches them back into
// fully-qualified paths.

use crate::transport::ApiTransport;
use crate::types::{AppError, Language, ProjectFile, ProjectInfo, ProjectListing};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

/// Single page size for collection fetches. Aggregating further pages is
/// a known limitation: projects with more than this many files,
/// directories, or branches come back truncated.
const PAGE_LIMIT: u32 = 500;

/// Crowdin wraps every resource in a `data` envelope; lists are
/// envelopes of envelopes.
#[derive(Debug, Deserialize)]
struct ApiObject<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ApiList<T> {
    data: Vec<ApiObject<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectNode {
    id: i64,
    name: String,
    #[serde(default, deserialize_with = "tri_state")]
    public_downloads: Option<Option<bool>>,
    #[serde(default)]
    target_language_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileNode {
    id: i64,
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    directory_id: Option<i64>,
    #[serde(default)]
    branch_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryNode {
    id: i64,
    name: String,
    #[serde(default)]
    directory_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BranchNode {
    id: i64,
    name: String,
}

struct DirectoryEntry {
    name: String,
    parent: Option<i64>,
}

/// Keeps an absent `publicDownloads` field (outer `None`) apart from an
/// explicit `null` (inner `None`). Both mean the file listing is
/// forbidden; a present `true` or `false` means it is allowed.
fn tri_state<'de, D>(deserializer: D) -> Result<Option<Option<bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(Some)
}

fn parse<T: DeserializeOwned>(raw: Value) -> Result<T, AppError> {
    serde_json::from_value(raw)
        .map_err(|e| AppError::Serialization(format!("Unexpected API response shape: {}", e)))
}

/// List projects visible to the authenticated user, skipping those
/// whose file listing the API would refuse to serve.
pub(crate) async fn list_user_projects(
    api: &ApiTransport,
) -> Result<Vec<ProjectListing>, AppError> {
    let raw = api.get_json(&format!("projects?limit={}", PAGE_LIMIT)).await?;
    let page: ApiList<ProjectNode> = parse(raw)?;

    Ok(page
        .data
        .into_iter()
        .map(|item| item.data)
        .filter_map(|node| match node.public_downloads {
            Some(Some(_)) => Some(ProjectListing {
                name: node.name,
                id: node.id,
            }),
            _ => {
                tracing::debug!("Skipping project {} without download access", node.id);
                None
            }
        })
        .collect())
}

/// Fetch project metadata and resolve every file's fully-qualified path.
///
/// Four sequential stages: project metadata, files, directories,
/// branches. Directory prefixes are applied before branch prefixes so
/// the branch name ends up outermost on the finished path.
pub(crate) async fn get_project_info(
    api: &ApiTransport,
    project_id: i64,
) -> Result<ProjectInfo, AppError> {
    let base = format!("projects/{}", project_id);

    let meta: ApiObject<ProjectNode> = parse(api.get_json(&base).await?)?;
    let mut project = ProjectInfo {
        name: meta.data.name,
        id: meta.data.id,
        languages: meta
            .data
            .target_language_ids
            .iter()
            .map(|tag| Language::parse(tag))
            .collect(),
        files: Vec::new(),
    };

    // "assets" entries are binary references, not translatable files
    let files: ApiList<FileNode> =
        parse(api.get_json(&format!("{}/files?limit={}", base, PAGE_LIMIT)).await?)?;
    project.files = files
        .data
        .into_iter()
        .map(|item| item.data)
        .filter(|node| node.kind.as_deref() != Some("assets"))
        .map(|node| ProjectFile {
            path: format!("/{}", node.name),
            id: node.id,
            directory_id: node.directory_id,
            branch_id: node.branch_id,
        })
        .collect();

    let dirs: ApiList<DirectoryNode> = parse(
        api.get_json(&format!("{}/directories?limit={}", base, PAGE_LIMIT))
            .await?,
    )?;
    let dirs: HashMap<i64, DirectoryEntry> = dirs
        .data
        .into_iter()
        .map(|item| {
            (
                item.data.id,
                DirectoryEntry {
                    name: item.data.name,
                    parent: item.data.directory_id,
                },
            )
        })
        .collect();
    apply_directory_paths(&mut project.files, &dirs);

    let branches: ApiList<BranchNode> = parse(
        api.get_json(&format!("{}/branches?limit={}", base, PAGE_LIMIT))
            .await?,
    )?;
    let branches: HashMap<i64, String> = branches
        .data
        .into_iter()
        .map(|item| (item.data.id, item.data.name))
        .collect();
    apply_branch_prefixes(&mut project.files, &branches);

    Ok(project)
}

/// Prefix each file's path with its ancestor directory names, root
/// first. A directory id missing from the fetched set ends the walk as
/// if the root had been reached; one broken record must not fail the
/// whole project.
fn apply_directory_paths(files: &mut [ProjectFile], dirs: &HashMap<i64, DirectoryEntry>) {
    for file in files {
        let mut segments = Vec::new();
        let mut cursor = file.directory_id;

        while let Some(dir_id) = cursor {
            let Some(dir) = dirs.get(&dir_id) else {
                tracing::warn!("Directory {} not in fetched set, treating as root", dir_id);
                break;
            };
            segments.push(dir.name.as_str());
            // A parent cycle would otherwise never terminate
            if segments.len() > dirs.len() {
                tracing::warn!("Directory parent cycle detected at {}", dir_id);
                break;
            }
            cursor = dir.parent;
        }

        if segments.is_empty() {
            continue;
        }

        let mut prefix = String::new();
        for name in segments.iter().rev() {
            prefix.push('/');
            prefix.push_str(name);
        }
        file.path = prefix + &file.path;
    }
}

/// Prefix branch names onto already directory-qualified paths
fn apply_branch_prefixes(files: &mut [ProjectFile], branches: &HashMap<i64, String>) {
    for file in files {
        let Some(branch_id) = file.branch_id else {
            continue;
        };
        let Some(name) = branches.get(&branch_id) else {
            tracing::warn!("Branch {} not in fetched set, leaving path as-is", branch_id);
            continue;
        };
        file.path = format!("/{}{}", name, file.path);
    }
}
