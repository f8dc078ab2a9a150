//! Canonical attachment representation.
//!
//! Attachments reach the client from several places (file picker, drag and
//! drop, clipboard, messages echoed back by the server) and historically used
//! two naming schemes for the same fields (`mime_type` vs `mimeType`,
//! `metadata.name` vs `metadata.filename`). [`AttachmentBlock`] is the one
//! in-memory shape; its serde impls are the normalisation boundary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const CSV_MEDIA_TYPE: &str = "text/csv";
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    PDF_MEDIA_TYPE,
    CSV_MEDIA_TYPE,
];

const BASE64_SOURCE: &str = "base64";

/// Check if a MIME type is accepted for upload
pub fn is_supported_media_type(media_type: &str) -> bool {
    SUPPORTED_MEDIA_TYPES.contains(&media_type)
}

/// Check if a MIME type is one of the accepted image types
pub fn is_image_media_type(media_type: &str) -> bool {
    SUPPORTED_IMAGE_TYPES.contains(&media_type)
}

/// Map a file extension to the MIME type the upload surfaces would report.
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some(PDF_MEDIA_TYPE),
        "csv" => Some(CSV_MEDIA_TYPE),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
    /// Text derived from a structured upload (CSV)
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Base64,
}

/// One non-text piece of user content staged for sending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "WireBlock")]
pub struct AttachmentBlock {
    pub kind: AttachmentKind,
    /// `Some(Base64)` for binary kinds, `None` for text-derived blocks
    pub encoding: Option<Encoding>,
    pub media_type: String,
    /// Base64 data, or the literal text for text-derived blocks
    pub payload: String,
    pub display_name: String,
    pub source_filename: String,
}

impl AttachmentBlock {
    pub fn binary(kind: AttachmentKind, media_type: &str, data: String, filename: &str) -> Self {
        Self {
            kind,
            encoding: Some(Encoding::Base64),
            media_type: media_type.to_string(),
            payload: data,
            display_name: filename.to_string(),
            source_filename: filename.to_string(),
        }
    }

    pub fn text_derived(media_type: &str, text: String, filename: &str) -> Self {
        Self {
            kind: AttachmentKind::Text,
            encoding: None,
            media_type: media_type.to_string(),
            payload: text,
            display_name: filename.to_string(),
            source_filename: filename.to_string(),
        }
    }

    pub fn is_text_kind(&self) -> bool {
        self.kind == AttachmentKind::Text
    }
}

/// Serialized form. Binary blocks carry both naming schemes so old and new
/// readers resolve the same values.
#[derive(Serialize)]
struct WireBlock {
    #[serde(rename = "type")]
    kind: AttachmentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    mime_type_camel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    metadata: WireMetadata,
}

#[derive(Serialize)]
struct WireMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    filename: String,
}

impl From<AttachmentBlock> for WireBlock {
    fn from(block: AttachmentBlock) -> Self {
        match block.kind {
            AttachmentKind::Text => WireBlock {
                kind: AttachmentKind::Text,
                source_type: None,
                source: None,
                mime_type: None,
                mime_type_camel: None,
                data: None,
                text: Some(block.payload),
                metadata: WireMetadata {
                    name: None,
                    filename: block.source_filename,
                },
            },
            kind => WireBlock {
                kind,
                source_type: Some(BASE64_SOURCE),
                source: Some(BASE64_SOURCE),
                mime_type: Some(block.media_type.clone()),
                mime_type_camel: Some(block.media_type),
                data: Some(block.payload),
                text: None,
                metadata: WireMetadata {
                    name: Some(block.display_name),
                    filename: block.source_filename,
                },
            },
        }
    }
}

/// Anything that looks like an attachment, in either naming scheme.
#[derive(Deserialize)]
struct RawBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    source_type: Option<Value>,
    #[serde(default)]
    source: Option<Value>,
    #[serde(default, rename = "mimeType")]
    mime_type_camel: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    mime: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default, rename = "fileName")]
    file_name: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockShapeError {
    #[error("unknown block type: {0}")]
    UnknownType(String),
    #[error("block source is not base64")]
    NotBase64,
    #[error("block has no media type")]
    MissingMediaType,
    #[error("media type {media_type} does not match block type {kind}")]
    KindMismatch { kind: String, media_type: String },
    #[error("block has no payload")]
    MissingPayload,
    #[error("text block has no filename, it is plain text")]
    PlainText,
}

impl TryFrom<RawBlock> for AttachmentBlock {
    type Error = BlockShapeError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let metadata = raw.metadata.unwrap_or_default();
        let name = metadata
            .name
            .clone()
            .or_else(|| metadata.filename.clone())
            .or_else(|| metadata.file_name.clone());
        let filename = metadata
            .filename
            .or(metadata.file_name)
            .or(metadata.name);

        match raw.kind.as_str() {
            "text" => {
                let filename = filename.ok_or(BlockShapeError::PlainText)?;
                let text = raw.text.ok_or(BlockShapeError::MissingPayload)?;
                let media_type = Path::new(&filename)
                    .extension()
                    .and_then(|ext| media_type_for_extension(&ext.to_string_lossy()))
                    .unwrap_or("text/plain");
                Ok(Self::text_derived(media_type, text, &filename))
            }
            "image" | "file" => {
                let source = raw
                    .source
                    .as_ref()
                    .and_then(Value::as_str)
                    .or_else(|| raw.source_type.as_ref().and_then(Value::as_str));
                if source != Some(BASE64_SOURCE) {
                    return Err(BlockShapeError::NotBase64);
                }

                let media_type = raw
                    .mime_type_camel
                    .or(raw.mime_type)
                    .or(raw.mime)
                    .ok_or(BlockShapeError::MissingMediaType)?;

                let kind = if raw.kind == "image" {
                    AttachmentKind::Image
                } else {
                    AttachmentKind::File
                };
                let matches = match kind {
                    AttachmentKind::Image => media_type.starts_with("image/"),
                    _ => media_type == PDF_MEDIA_TYPE,
                };
                if !matches {
                    return Err(BlockShapeError::KindMismatch {
                        kind: raw.kind,
                        media_type,
                    });
                }

                let data = raw.data.ok_or(BlockShapeError::MissingPayload)?;
                Ok(Self {
                    kind,
                    encoding: Some(Encoding::Base64),
                    media_type,
                    payload: data,
                    display_name: name.clone().unwrap_or_default(),
                    source_filename: filename.or(name).unwrap_or_default(),
                })
            }
            other => Err(BlockShapeError::UnknownType(other.to_string())),
        }
    }
}

/// Where the bytes of an uploaded file come from.
#[derive(Clone, Debug)]
pub enum FileSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
    /// `data:<mime>;base64,<data>` text, as produced by clipboard readers
    DataUrl(String),
}

/// A raw file handed over by a file picker, drop target or paste handler.
#[derive(Clone, Debug)]
pub struct FileInput {
    pub name: String,
    pub mime_type: String,
    pub source: FileSource,
}

impl FileInput {
    pub fn from_bytes(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            source: FileSource::Bytes(bytes),
        }
    }

    /// Describe a file on disk. The MIME type is inferred from the extension
    /// and left empty when unknown, which the normalizer rejects.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime_type = path
            .extension()
            .and_then(|ext| media_type_for_extension(&ext.to_string_lossy()))
            .unwrap_or_default();
        Self {
            name,
            mime_type: mime_type.to_string(),
            source: FileSource::Path(path.to_path_buf()),
        }
    }
}

/// Ordered attachments for the message currently being composed.
#[derive(Clone, Debug, Default)]
pub struct AttachmentStaging {
    blocks: Vec<AttachmentBlock>,
}

impl AttachmentStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[AttachmentBlock] {
        &self.blocks
    }

    pub fn push(&mut self, block: AttachmentBlock) {
        self.blocks.push(block);
    }

    /// Remove attachment by index
    pub fn remove(&mut self, index: usize) -> Option<AttachmentBlock> {
        if index < self.blocks.len() {
            Some(self.blocks.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Hand the staged blocks to a send and leave the staging area empty.
    pub fn take(&mut self) -> Vec<AttachmentBlock> {
        std::mem::take(&mut self.blocks)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_block_serializes_both_naming_schemes() {
        let block = AttachmentBlock::binary(AttachmentKind::Image, "image/png", "AAAA".into(), "cat.png");
        let value = serde_json::to_value(&block).unwrap();

        assert_eq!(value["type"], "image");
        assert_eq!(value["mime_type"], value["mimeType"]);
        assert_eq!(value["mimeType"], "image/png");
        assert_eq!(value["source_type"], "base64");
        assert_eq!(value["source"], "base64");
        assert_eq!(value["metadata"]["name"], value["metadata"]["filename"]);
        assert_eq!(value["metadata"]["filename"], "cat.png");
    }

    #[test]
    fn test_text_block_carries_only_filename() {
        let block = AttachmentBlock::text_derived(CSV_MEDIA_TYPE, "[]".into(), "rows.csv");
        let value = serde_json::to_value(&block).unwrap();

        assert_eq!(value, json!({"type": "text", "text": "[]", "metadata": {"filename": "rows.csv"}}));
    }

    #[test]
    fn test_legacy_snake_case_block_normalizes() {
        let value = json!({
            "type": "file",
            "source_type": "base64",
            "mime_type": "application/pdf",
            "data": "JVBER",
            "metadata": {"filename": "report.pdf"}
        });
        let block: AttachmentBlock = serde_json::from_value(value).unwrap();

        assert_eq!(block.kind, AttachmentKind::File);
        assert_eq!(block.media_type, "application/pdf");
        assert_eq!(block.display_name, "report.pdf");
        assert_eq!(block.source_filename, "report.pdf");
    }

    #[test]
    fn test_block_with_both_schemes_prefers_canonical() {
        let value = json!({
            "type": "image",
            "source": "base64",
            "source_type": "base64",
            "mimeType": "image/webp",
            "mime_type": "image/webp",
            "data": "UklG",
            "metadata": {"name": "a.webp", "fileName": "a.webp"}
        });
        let block: AttachmentBlock = serde_json::from_value(value).unwrap();

        assert_eq!(block.media_type, "image/webp");
        assert_eq!(block.display_name, "a.webp");
    }

    #[test]
    fn test_rejects_mismatched_kind_and_media_type() {
        let value = json!({
            "type": "file",
            "source": "base64",
            "mimeType": "image/png",
            "data": "AAAA"
        });
        assert!(serde_json::from_value::<AttachmentBlock>(value).is_err());
    }

    #[test]
    fn test_rejects_url_sourced_image() {
        let value = json!({"type": "image", "source_type": "url", "mimeType": "image/png", "data": "x"});
        assert!(serde_json::from_value::<AttachmentBlock>(value).is_err());
    }

    #[test]
    fn test_from_path_infers_media_type() {
        let input = FileInput::from_path(Path::new("/tmp/Photo.JPG"));
        assert_eq!(input.name, "Photo.JPG");
        assert_eq!(input.mime_type, "image/jpeg");

        let unknown = FileInput::from_path(Path::new("/tmp/notes.txt"));
        assert!(unknown.mime_type.is_empty());
    }

    #[test]
    fn test_staging_remove_out_of_range_is_noop() {
        let mut staging = AttachmentStaging::new();
        staging.push(AttachmentBlock::binary(AttachmentKind::Image, "image/gif", "R0lG".into(), "a.gif"));

        assert!(staging.remove(3).is_none());
        assert_eq!(staging.len(), 1);
        assert_eq!(staging.take().len(), 1);
        assert!(staging.is_empty());
    }
}
