//! Turns raw files into [`AttachmentBlock`]s.
//!
//! Images and PDFs become base64 blocks. CSV files are parsed and staged as
//! a text block holding the rows as pretty-printed JSON, so the agent reads
//! the data instead of a binary blob.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use super::csv::{parse_csv, rows_to_json};
use crate::models::attachment::{
    AttachmentBlock, AttachmentKind, AttachmentStaging, CSV_MEDIA_TYPE, FileInput, FileSource, PDF_MEDIA_TYPE,
    is_image_media_type, is_supported_media_type,
};
use crate::models::notification_store::Notification;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("Unsupported file type: {media_type} ({name})")]
    UnsupportedType { name: String, media_type: String },

    #[error("Duplicate file: {0}")]
    Duplicate(String),

    #[error("Failed to read {name}: {reason}")]
    Encoding { name: String, reason: String },

    #[error("Failed to parse CSV {name}: {reason}")]
    CsvParse { name: String, reason: String },
}

fn kind_for_media_type(media_type: &str) -> Option<AttachmentKind> {
    if is_image_media_type(media_type) {
        Some(AttachmentKind::Image)
    } else if media_type == PDF_MEDIA_TYPE {
        Some(AttachmentKind::File)
    } else if media_type == CSV_MEDIA_TYPE {
        Some(AttachmentKind::Text)
    } else {
        None
    }
}

async fn read_bytes(file: &FileInput) -> Result<Vec<u8>, AttachmentError> {
    let encoding_error = |reason: String| AttachmentError::Encoding {
        name: file.name.clone(),
        reason,
    };

    match &file.source {
        FileSource::Bytes(bytes) => Ok(bytes.clone()),
        FileSource::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|e| encoding_error(e.to_string())),
        FileSource::DataUrl(url) => STANDARD
            .decode(strip_data_url_prefix(url))
            .map_err(|e| encoding_error(e.to_string())),
    }
}

fn strip_data_url_prefix(url: &str) -> &str {
    match url.split_once(',') {
        Some((_, data)) => data.trim(),
        None => url.trim(),
    }
}

/// Base64 of the file contents, without any data-URL prefix
pub async fn encode_file(file: &FileInput) -> Result<String, AttachmentError> {
    match &file.source {
        FileSource::DataUrl(url) => {
            let data = strip_data_url_prefix(url);
            STANDARD
                .decode(data)
                .map_err(|e| AttachmentError::Encoding {
                    name: file.name.clone(),
                    reason: e.to_string(),
                })?;
            Ok(data.to_string())
        }
        _ => Ok(STANDARD.encode(read_bytes(file).await?)),
    }
}

/// Build the canonical block for one file.
pub async fn build_attachment(file: &FileInput) -> Result<AttachmentBlock, AttachmentError> {
    let kind = kind_for_media_type(&file.mime_type)
        .filter(|_| is_supported_media_type(&file.mime_type))
        .ok_or_else(|| AttachmentError::UnsupportedType {
            name: file.name.clone(),
            media_type: file.mime_type.clone(),
        })?;

    match kind {
        AttachmentKind::Text => {
            let bytes = read_bytes(file).await?;
            let text = String::from_utf8(bytes).map_err(|e| AttachmentError::CsvParse {
                name: file.name.clone(),
                reason: e.to_string(),
            })?;
            let rows = parse_csv(&text);
            debug!(file = %file.name, rows = rows.len(), "Parsed CSV attachment");
            Ok(AttachmentBlock::text_derived(
                CSV_MEDIA_TYPE,
                rows_to_json(&rows),
                &file.name,
            ))
        }
        kind => {
            let data = encode_file(file).await?;
            Ok(AttachmentBlock::binary(kind, &file.mime_type, data, &file.name))
        }
    }
}

/// Same kind, media type and display name as an already staged block
pub fn is_duplicate(file: &FileInput, existing: &[AttachmentBlock]) -> bool {
    let Some(kind) = kind_for_media_type(&file.mime_type) else {
        return false;
    };
    existing.iter().any(|block| {
        block.kind == kind && block.media_type == file.mime_type && block.display_name == file.name
    })
}

/// Stage a single file, refusing duplicates.
pub async fn attach_file(file: &FileInput, staging: &mut AttachmentStaging) -> Result<(), AttachmentError> {
    if is_duplicate(file, staging.blocks()) {
        return Err(AttachmentError::Duplicate(file.name.clone()));
    }
    let block = build_attachment(file).await?;
    staging.push(block);
    Ok(())
}

/// Outcome of staging one selection of files
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageReport {
    pub added: usize,
    pub unsupported: Vec<String>,
    pub duplicates: Vec<String>,
    /// `(filename, reason)` for files that could not be read or parsed
    pub failed: Vec<(String, String)>,
}

impl StageReport {
    pub fn has_problems(&self) -> bool {
        !self.unsupported.is_empty() || !self.duplicates.is_empty() || !self.failed.is_empty()
    }

    /// At most one error and one warning for the whole selection.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut notifications = Vec::new();

        let mut problems = Vec::new();
        if !self.unsupported.is_empty() {
            problems.push(format!(
                "Unsupported file type(s): {}. Please use JPEG, PNG, GIF, WEBP images, PDF or CSV.",
                self.unsupported.join(", ")
            ));
        }
        for (name, reason) in &self.failed {
            problems.push(format!("{}: {}", name, reason));
        }
        if !problems.is_empty() {
            notifications.push(
                Notification::error("Some files could not be attached").with_description(problems.join("\n")),
            );
        }

        if !self.duplicates.is_empty() {
            notifications.push(Notification::warning(format!(
                "Duplicate file(s) detected: {}. Each file can only be uploaded once per message.",
                self.duplicates.join(", ")
            )));
        }

        notifications
    }
}

/// Stage every file of one selection.
///
/// Files are read concurrently but land in the staging area in selection
/// order. Duplicates are checked against what is already staged and against
/// earlier files of the same selection.
pub async fn stage_files(files: Vec<FileInput>, staging: &mut AttachmentStaging) -> StageReport {
    let mut report = StageReport::default();
    let mut seen: HashSet<(AttachmentKind, String, String)> = staging
        .blocks()
        .iter()
        .map(|b| (b.kind, b.media_type.clone(), b.display_name.clone()))
        .collect();

    let mut accepted = Vec::new();
    for file in files {
        let Some(kind) = kind_for_media_type(&file.mime_type) else {
            report.unsupported.push(file.name.clone());
            continue;
        };
        if !seen.insert((kind, file.mime_type.clone(), file.name.clone())) {
            report.duplicates.push(file.name.clone());
            continue;
        }
        accepted.push(file);
    }

    let results = join_all(accepted.iter().map(build_attachment)).await;
    for (file, result) in accepted.iter().zip(results) {
        match result {
            Ok(block) => {
                staging.push(block);
                report.added += 1;
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "Failed to stage attachment");
                report.failed.push((file.name.clone(), e.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification_store::NotificationLevel;
    use std::io::Write;

    fn png(name: &str) -> FileInput {
        FileInput::from_bytes(name, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
    }

    #[tokio::test]
    async fn test_image_block_has_base64_payload() {
        let block = build_attachment(&png("a.png")).await.unwrap();

        assert_eq!(block.kind, AttachmentKind::Image);
        assert_eq!(block.payload, "iVBORw==");
        assert_eq!(block.display_name, "a.png");
    }

    #[tokio::test]
    async fn test_unsupported_type_rejected() {
        let file = FileInput::from_bytes("notes.txt", "text/plain", b"hi".to_vec());
        let err = build_attachment(&file).await.unwrap_err();
        assert!(matches!(err, AttachmentError::UnsupportedType { .. }));
    }

    #[tokio::test]
    async fn test_csv_becomes_text_block() {
        let file = FileInput::from_bytes("people.csv", "text/csv", b"name,age\nAn,30\n".to_vec());
        let block = build_attachment(&file).await.unwrap();

        assert_eq!(block.kind, AttachmentKind::Text);
        assert_eq!(block.encoding, None);
        let rows: serde_json::Value = serde_json::from_str(&block.payload).unwrap();
        assert_eq!(rows[0]["name"], "An");
        assert_eq!(
            serde_json::to_value(&block).unwrap()["metadata"],
            serde_json::json!({"filename": "people.csv"})
        );
    }

    #[tokio::test]
    async fn test_header_only_csv_is_empty_array() {
        let file = FileInput::from_bytes("h.csv", "text/csv", b"a,b\n".to_vec());
        let block = build_attachment(&file).await.unwrap();
        assert_eq!(block.payload, "[]");
    }

    #[tokio::test]
    async fn test_invalid_utf8_csv_is_parse_error() {
        let file = FileInput::from_bytes("bad.csv", "text/csv", vec![0xff, 0xfe, 0x00]);
        let err = build_attachment(&file).await.unwrap_err();
        assert!(matches!(err, AttachmentError::CsvParse { .. }));
    }

    #[tokio::test]
    async fn test_data_url_prefix_stripped() {
        let file = FileInput {
            name: "p.png".into(),
            mime_type: "image/png".into(),
            source: FileSource::DataUrl("data:image/png;base64,iVBORw==".into()),
        };
        assert_eq!(encode_file(&file).await.unwrap(), "iVBORw==");

        let broken = FileInput {
            source: FileSource::DataUrl("data:image/png;base64,@@@".into()),
            ..file
        };
        assert!(matches!(encode_file(&broken).await, Err(AttachmentError::Encoding { .. })));
    }

    #[tokio::test]
    async fn test_path_source_is_read() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.4").unwrap();

        let file = FileInput::from_path(tmp.path());
        assert_eq!(file.mime_type, "application/pdf");
        let block = build_attachment(&file).await.unwrap();
        assert_eq!(block.kind, AttachmentKind::File);
        assert_eq!(block.payload, STANDARD.encode(b"%PDF-1.4"));
    }

    #[tokio::test]
    async fn test_same_file_twice_stages_once_with_one_warning() {
        let mut staging = AttachmentStaging::new();

        let first = stage_files(vec![png("cat.png")], &mut staging).await;
        let second = stage_files(vec![png("cat.png")], &mut staging).await;

        assert_eq!(first.added, 1);
        assert_eq!(staging.len(), 1);
        assert_eq!(second.duplicates, vec!["cat.png"]);
        let notes = second.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Warning);
    }

    #[tokio::test]
    async fn test_batch_dedupes_within_selection_and_aggregates() {
        let mut staging = AttachmentStaging::new();
        let files = vec![
            png("a.png"),
            FileInput::from_bytes("x.exe", "application/octet-stream", vec![1]),
            png("a.png"),
            FileInput::from_bytes("b.pdf", "application/pdf", b"%PDF".to_vec()),
            FileInput::from_bytes("y.zip", "application/zip", vec![1]),
            FileInput::from_bytes("bad.csv", "text/csv", vec![0xff]),
        ];

        let report = stage_files(files, &mut staging).await;

        assert_eq!(report.added, 2);
        assert_eq!(report.unsupported, vec!["x.exe", "y.zip"]);
        assert_eq!(report.duplicates, vec!["a.png"]);
        assert_eq!(report.failed.len(), 1);
        let names: Vec<&str> = staging.blocks().iter().map(|b| b.display_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.pdf"]);

        let notes = report.notifications();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes.iter().filter(|n| n.level == NotificationLevel::Error).count(), 1);
    }

    #[tokio::test]
    async fn test_attach_file_reports_duplicate() {
        let mut staging = AttachmentStaging::new();
        attach_file(&png("a.png"), &mut staging).await.unwrap();
        let err = attach_file(&png("a.png"), &mut staging).await.unwrap_err();
        assert_eq!(err, AttachmentError::Duplicate("a.png".into()));
    }

    #[test]
    fn test_is_duplicate_needs_matching_kind_and_type() {
        let existing = vec![AttachmentBlock::binary(AttachmentKind::Image, "image/png", "AA".into(), "a.png")];
        assert!(is_duplicate(&png("a.png"), &existing));
        assert!(!is_duplicate(&FileInput::from_bytes("a.png", "image/jpeg", vec![]), &existing));
        assert!(!is_duplicate(&png("b.png"), &existing));
    }
}
