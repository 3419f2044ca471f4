use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::ConvertError;
use crate::extract::{extract_text, MimeType};
use crate::parser::{structure_text, Document, Structured, StructuringWarning};

const PROCESSING_STATUS: &str = "success";

/// A document already stored on disk, with what the uploader declared about it.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime: MimeType,
}

impl UploadedFile {
    /// Describe a local file. Without an explicit type, the extension decides.
    pub fn from_path(path: &Path, mime: Option<MimeType>) -> Result<Self, ConvertError> {
        let mime = match mime {
            Some(m) => m,
            None => MimeType::from_extension(path)?,
        };
        let size = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(UploadedFile {
            original_name,
            path: path.to_path_buf(),
            size,
            mime,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub file_name: String,
    pub data: Document,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
    #[serde(skip)]
    pub warnings: Vec<StructuringWarning>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(serialize_with = "iso_millis")]
    pub converted_at: DateTime<Utc>,
    pub file_size: u64,
    pub mime_type: &'static str,
    pub processing_status: &'static str,
}

fn iso_millis<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Wrap a structured document with its file metadata.
pub fn assemble(
    upload: &UploadedFile,
    structured: Structured,
    converted_at: DateTime<Utc>,
) -> ConversionResult {
    ConversionResult {
        file_name: upload.original_name.clone(),
        data: structured.document,
        metadata: Metadata {
            converted_at,
            file_size: upload.size,
            mime_type: upload.mime.as_str(),
            processing_status: PROCESSING_STATUS,
        },
        json_path: None,
        warnings: structured.warnings,
    }
}

/// `<original stem>_<unix millis>.json`
pub fn artifact_name(original_name: &str, millis: i64) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}_{}.json", stem, millis)
}

/// Write the result as pretty JSON into `dir` and return the file path.
pub fn save_artifact(dir: &Path, result: &ConversionResult) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let name = artifact_name(
        &result.file_name,
        result.metadata.converted_at.timestamp_millis(),
    );
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(result)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Extract, structure, assemble and (per settings) persist one document.
pub fn convert_document(
    upload: &UploadedFile,
    settings: &Settings,
) -> Result<ConversionResult, ConvertError> {
    let text = extract_text(&upload.path, upload.mime)?;
    let structured = structure_text(&text);
    let mut result = assemble(upload, structured, Utc::now());

    if settings.save_json {
        result.json_path = Some(save_artifact(&settings.output_dir, &result)?);
    }

    debug!(
        "Sections of {}: {}",
        upload.original_name,
        result.data.keys().collect::<Vec<_>>().join(", ")
    );
    info!(
        "Converted {} ({}, {} bytes): {} sections, {} warnings",
        upload.original_name,
        upload.mime,
        upload.size,
        result.data.len(),
        result.warnings.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::write_docx;
    use chrono::TimeZone;
    use serde_json::json;

    fn settings(dir: &Path, save_json: bool) -> Settings {
        Settings {
            uploads_dir: dir.join("uploads"),
            output_dir: dir.join("temp"),
            db_path: dir.join("ledger.sqlite"),
            addr: "127.0.0.1:0".into(),
            save_json,
        }
    }

    fn upload(path: &Path, mime: MimeType) -> UploadedFile {
        UploadedFile::from_path(path, Some(mime)).unwrap()
    }

    #[test]
    fn assembled_shape() {
        let file = UploadedFile {
            original_name: "notes.txt".into(),
            path: PathBuf::from("uploads/1700000000000.txt"),
            size: 42,
            mime: MimeType::PlainText,
        };
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let result = assemble(&file, structure_text("Name: Alice"), at);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "fileName": "notes.txt",
                "data": { "name": "Alice" },
                "metadata": {
                    "convertedAt": "2024-03-04T10:00:00.000Z",
                    "fileSize": 42,
                    "mimeType": "text/plain",
                    "processingStatus": "success"
                }
            })
        );
    }

    #[test]
    fn artifact_names() {
        assert_eq!(artifact_name("report.docx", 1700000000000), "report_1700000000000.json");
        assert_eq!(artifact_name("../../etc/x.txt", 5), "x_5.json");
        assert_eq!(artifact_name("archive.tar.txt", 5), "archive.tar_5.json");
    }

    #[test]
    fn converts_and_saves_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("resume.txt");
        fs::copy("tests/fixtures/resume.txt", &path).unwrap();

        let result = convert_document(
            &upload(&path, MimeType::PlainText),
            &settings(tmp.path(), true),
        )
        .unwrap();
        assert_eq!(result.file_name, "resume.txt");
        assert_eq!(result.metadata.file_size, fs::metadata(&path).unwrap().len());

        let saved = result.json_path.clone().unwrap();
        assert!(saved.starts_with(tmp.path().join("temp")));
        let on_disk: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&saved).unwrap()).unwrap();
        assert_eq!(on_disk["data"]["name"], "Jane Doe");
        assert_eq!(on_disk["metadata"]["processingStatus"], "success");
        // The saved artifact does not point at itself.
        assert!(on_disk.get("jsonPath").is_none());
    }

    #[test]
    fn no_save_leaves_path_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "Tasks:\n- one").unwrap();
        let result =
            convert_document(&upload(&path, MimeType::PlainText), &settings(tmp.path(), false))
                .unwrap();
        assert!(result.json_path.is_none());
        assert!(!tmp.path().join("temp").exists());
    }

    #[test]
    fn converts_docx() {
        let tmp = tempfile::tempdir().unwrap();
        let xml = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Steps:</w:t></w:r></w:p>
            <w:p><w:r><w:t>1. Plan</w:t></w:r></w:p>
            <w:p><w:r><w:t>2. Execute</w:t></w:r></w:p>
            </w:body></w:document>"#;
        let path = write_docx(tmp.path(), "plan.docx", xml);
        let result = convert_document(
            &upload(&path, MimeType::WordOpenXml),
            &settings(tmp.path(), false),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&result.data).unwrap(),
            json!({ "steps": [
                { "number": 1, "content": "Plan" },
                { "number": 2, "content": "Execute" }
            ] })
        );
        assert_eq!(
            result.metadata.mime_type,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
    }

    #[test]
    fn extraction_failure_is_wrapped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.docx");
        fs::write(&path, b"not a zip").unwrap();
        let err = convert_document(
            &upload(&path, MimeType::WordOpenXml),
            &settings(tmp.path(), true),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Conversion(_)));
        assert!(err.to_string().starts_with("Document conversion failed: "));
    }

    #[test]
    fn unknown_extension_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scan.pdf");
        fs::write(&path, b"%PDF").unwrap();
        assert!(matches!(
            UploadedFile::from_path(&path, None),
            Err(ConvertError::UnsupportedType(_))
        ));
    }
}
