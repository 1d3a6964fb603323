// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - File upload and download
//
// Neither direction is a single request: downloads go through an export
// build that yields a transient content URL, uploads go through a
// temporary storage slot that is then committed as a translation.

use crate::transport::{self, ApiTransport};
use crate::types::{AppError, Language};
use serde_json::json;
use std::path::Path;

/// XLIFF and PO files round-trip through Crowdin natively; every other
/// format is exported through Crowdin's XLIFF conversion.
pub(crate) fn export_as_xliff(file_extension: &str) -> bool {
    let ext = file_extension.to_ascii_lowercase();
    ext != "xliff" && ext != "po"
}

/// Request an export build for one file and stream the result into
/// `output_file`.
pub(crate) async fn download_file(
    api: &ApiTransport,
    project_id: i64,
    lang: &Language,
    file_id: i64,
    file_extension: &str,
    output_file: &Path,
) -> Result<(), AppError> {
    tracing::info!(
        "Requesting export of file {} ({}) from project {}",
        file_id,
        lang,
        project_id
    );

    let response = api
        .post_json(
            &format!(
                "projects/{}/translations/builds/files/{}",
                project_id, file_id
            ),
            &json!({
                "targetLanguageId": lang.tag(),
                "exportAsXliff": export_as_xliff(file_extension),
            }),
        )
        .await?;

    let url = response
        .get("data")
        .and_then(|data| data.get("url"))
        .and_then(|url| url.as_str())
        .ok_or(AppError::MissingField("data.url"))?;

    transport::download(url, output_file).await
}

/// Stage `content` in temporary storage, then commit it as a translation
/// update. A staged upload whose commit fails is left behind for the
/// caller to retry.
pub(crate) async fn upload_file(
    api: &ApiTransport,
    project_id: i64,
    lang: &Language,
    file_id: i64,
    file_extension: &str,
    content: Vec<u8>,
) -> Result<(), AppError> {
    let staged = api
        .post_octet_stream(
            "storages",
            content,
            &[(
                "Crowdin-API-FileName",
                format!("crowdin.{}", file_extension),
            )],
        )
        .await?;

    let storage_id = staged
        .get("data")
        .and_then(|data| data.get("id"))
        .and_then(|id| id.as_i64())
        .ok_or(AppError::MissingField("data.id"))?;

    tracing::info!(
        "Committing storage {} as {} translation of file {} in project {}",
        storage_id,
        lang,
        file_id,
        project_id
    );

    api.post_json(
        &format!("projects/{}/translations/{}", project_id, lang.tag()),
        &json!({
            "storageId": storage_id,
            "fileId": file_id,
            "importDuplicates": true,
        }),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_export_as_xliff_only_for_foreign_formats() {
        assert!(!export_as_xliff("po"));
        assert!(!export_as_xliff("PO"));
        assert!(!export_as_xliff("xliff"));
        assert!(!export_as_xliff("XLIFF"));
        assert!(export_as_xliff("strings"));
        assert!(export_as_xliff("resx"));
        assert!(export_as_xliff(""));
    }

    #[tokio::test]
    async fn test_download_streams_exported_bytes() {
        let server = MockServer::start_async().await;
        let export_url = server.url("/exports/42.po");

        let build = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/projects/7/translations/builds/files/42")
                    .json_body(json!({"targetLanguageId": "cs", "exportAsXliff": false}));
                then.status(200).json_body(json!({"data": {"url": export_url}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/exports/42.po");
                then.status(200).body("exported contents");
            })
            .await;

        let api = ApiTransport::new(&server.url("/api/v2"));
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("cs.po");

        download_file(&api, 7, &Language::parse("cs"), 42, "po", &output)
            .await
            .unwrap();

        build.assert_async().await;
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "exported contents");
    }

    #[tokio::test]
    async fn test_download_missing_url_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/projects/7/translations/builds/files/42");
                then.status(200).json_body(json!({"data": {}}));
            })
            .await;

        let api = ApiTransport::new(&server.url("/api/v2"));
        let dir = tempfile::tempdir().unwrap();
        let err = download_file(
            &api,
            7,
            &Language::parse("cs"),
            42,
            "po",
            &dir.path().join("cs.po"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::MissingField("data.url")));
    }

    #[tokio::test]
    async fn test_upload_stages_then_commits() {
        let server = MockServer::start_async().await;

        let staging = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/storages")
                    .header("Content-Type", "application/octet-stream")
                    .header("Crowdin-API-FileName", "crowdin.po")
                    .body("msgid \"x\"\n");
                then.status(201).json_body(json!({"data": {"id": 901}}));
            })
            .await;
        let commit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/projects/7/translations/pt-BR")
                    .json_body(json!({
                        "storageId": 901,
                        "fileId": 42,
                        "importDuplicates": true,
                    }));
                then.status(200).json_body(json!({"data": {}}));
            })
            .await;

        let api = ApiTransport::new(&server.url("/api/v2"));
        upload_file(
            &api,
            7,
            &Language::parse("pt-BR"),
            42,
            "po",
            b"msgid \"x\"\n".to_vec(),
        )
        .await
        .unwrap();

        staging.assert_async().await;
        commit.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_commit_surfaces_api_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/storages");
                then.status(201).json_body(json!({"data": {"id": 901}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/projects/7/translations/cs");
                then.status(400).json_body(json!({
                    "errors": [{"error": {"errors": [{"message": "Language not in project"}]}}]
                }));
            })
            .await;

        let api = ApiTransport::new(&server.url("/api/v2"));
        let err = upload_file(&api, 7, &Language::parse("cs"), 42, "po", Vec::new())
            .await
            .unwrap_err();

        match err {
            AppError::Api(message) => assert!(message.contains("Language not in project")),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }
}
