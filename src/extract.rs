use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::ConvertError;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOC_MIME: &str = "application/msword";
const TEXT_MIME: &str = "text/plain";

/// The accepted input types. Everything else is rejected up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeType {
    PlainText,
    MsWord,
    WordOpenXml,
}

impl MimeType {
    /// Parse a declared content type. Parameters such as `; charset=utf-8`
    /// are ignored.
    pub fn parse(declared: &str) -> Result<Self, ConvertError> {
        let essence = declared.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            TEXT_MIME => Ok(MimeType::PlainText),
            DOC_MIME => Ok(MimeType::MsWord),
            DOCX_MIME => Ok(MimeType::WordOpenXml),
            _ => Err(ConvertError::UnsupportedType(declared.to_string())),
        }
    }

    /// Guess from a file extension, for local files that carry no content type.
    pub fn from_extension(path: &Path) -> Result<Self, ConvertError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "txt" => Ok(MimeType::PlainText),
            "doc" => Ok(MimeType::MsWord),
            "docx" => Ok(MimeType::WordOpenXml),
            _ => Err(ConvertError::UnsupportedType(path.display().to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::PlainText => TEXT_MIME,
            MimeType::MsWord => DOC_MIME,
            MimeType::WordOpenXml => DOCX_MIME,
        }
    }

    /// File extension used when storing an upload of this type.
    pub fn extension(&self) -> &'static str {
        match self {
            MimeType::PlainText => "txt",
            MimeType::MsWord => "doc",
            MimeType::WordOpenXml => "docx",
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pull the raw text out of a stored document.
pub fn extract_text(path: &Path, mime: MimeType) -> Result<String> {
    match mime {
        MimeType::PlainText => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        // Both Word types go through the OOXML reader; a legacy binary .doc
        // is not a zip container and fails here.
        MimeType::MsWord | MimeType::WordOpenXml => {
            let file =
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            let mut archive = ZipArchive::new(file)
                .with_context(|| format!("{} is not a Word (OOXML) document", path.display()))?;
            let mut xml = String::new();
            archive
                .by_name("word/document.xml")
                .map_err(|_| anyhow!("missing word/document.xml"))?
                .read_to_string(&mut xml)
                .context("Failed to read word/document.xml")?;
            document_xml_text(&xml)
        }
    }
}

/// Raw text of a `word/document.xml` body: one paragraph per block,
/// separated by a blank line. Tabs and breaks inside a paragraph are kept.
pub fn document_xml_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                text.push_str(&e.unescape()?);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}
