//! Turns uploaded files into [`FileContextUnit`]s.
//!
//! Admission is size-based (20 MB by default) with an optional extension
//! allow-list. Accepted files are classified as text, extractable document or
//! opaque binary and normalized accordingly.

use crate::doc_processor::{self, ExtractError};
use crate::file_store::{ContentKind, FileContextUnit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILE_BYTES: u64 = 20 * 1024 * 1024;

const BINARY_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/zip",
    "application/x-zip-compressed",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "doc", "xlsx", "xls", "pptx", "ppt", "jpg", "jpeg", "png", "gif", "webp", "zip",
    "rar", "7z", "exe", "dll", "bin",
];

const TEXT_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/csv",
    "application/json",
    "text/javascript",
    "text/typescript",
    "application/javascript",
    "application/typescript",
    "text/html",
    "text/css",
    "text/xml",
    "application/xml",
    "text/yaml",
    "text/x-python",
    "text/x-java",
    "text/x-c",
    "text/x-cpp",
    "text/x-ruby",
    "text/x-php",
    "text/x-go",
    "image/svg+xml",
];

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "json", "js", "ts", "html", "htm", "css", "xml", "yaml", "yml",
    "toml", "py", "java", "c", "h", "cpp", "rb", "php", "go", "rs", "sh", "log", "ini",
    "svg",
];

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Text,
    Pdf,
    Word,
    Binary,
}

/// Decide how a file is read. Depends only on the (MIME type, extension) pair.
pub fn classify(mime_type: &str, extension: Option<&str>) -> Classification {
    let mime = mime_type.trim().to_lowercase();
    let ext = extension.map(str::to_lowercase);
    let ext = ext.as_deref();

    if BINARY_MIME_TYPES.contains(&mime.as_str())
        || ext.is_some_and(|e| BINARY_EXTENSIONS.contains(&e))
    {
        return if mime == "application/pdf" || ext == Some("pdf") {
            Classification::Pdf
        } else if mime == DOCX_MIME || ext == Some("docx") {
            Classification::Word
        } else {
            Classification::Binary
        };
    }

    if TEXT_MIME_TYPES.contains(&mime.as_str()) || mime.starts_with("text/") {
        return Classification::Text;
    }

    if mime.starts_with("image/") || mime.starts_with("audio/") || mime.starts_with("video/") {
        return Classification::Binary;
    }

    // Unknown type: guess from the extension. Only an explicit octet-stream
    // without a known text extension is kept opaque.
    match ext {
        Some(e) if TEXT_EXTENSIONS.contains(&e) => Classification::Text,
        _ if mime == "application/octet-stream" => Classification::Binary,
        _ => Classification::Text,
    }
}

pub fn extension_of(name: &str) -> Option<&str> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
}

/// Where an upload's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A file handed over by the picker, not yet read.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// May be empty when the picker could not tell.
    pub declared_mime: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

impl UploadedFile {
    pub fn from_bytes(name: impl Into<String>, declared_mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_mime: declared_mime.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Describe a file on disk. No MIME type is declared; it is derived from
    /// the extension at ingestion time.
    pub async fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(Self {
            name,
            declared_mime: String::new(),
            size_bytes: metadata.len(),
            source: FileSource::Path(path),
        })
    }

    /// Declared type, or `application/<ext>` when nothing was declared.
    pub fn effective_mime(&self) -> String {
        let declared = self.declared_mime.trim();
        if !declared.is_empty() {
            return declared.to_string();
        }
        match extension_of(&self.name) {
            Some(ext) => format!("application/{}", ext.to_lowercase()),
            None => "application/octet-stream".to_string(),
        }
    }

    async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await,
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_file_bytes: u64,
    /// Lower-case extensions without the dot. `None` admits every type.
    pub allowed_extensions: Option<Vec<String>>,
    /// Route PDFs and Word documents through text extraction instead of
    /// tagging them as binary.
    pub extract_documents: bool,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            allowed_extensions: None,
            extract_documents: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("File {name} is too large. Maximum size is {}MB.", .limit / (1024 * 1024))]
    SizeExceeded { name: String, size: u64, limit: u64 },
    #[error("File {name} has an unsupported type ({mime_type}).")]
    UnsupportedType { name: String, mime_type: String },
    #[error("Failed to read file: {name} ({reason})")]
    ReadFailure { name: String, reason: String },
    #[error("Failed to extract text from {name}: {source}")]
    Extraction {
        name: String,
        #[source]
        source: ExtractError,
    },
}

impl IngestError {
    pub fn file_name(&self) -> &str {
        match self {
            IngestError::SizeExceeded { name, .. }
            | IngestError::UnsupportedType { name, .. }
            | IngestError::ReadFailure { name, .. }
            | IngestError::Extraction { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    policy: UploadPolicy,
}

impl Normalizer {
    pub fn new(policy: UploadPolicy) -> Self {
        Self { policy }
    }

    /// Admit, read and normalize one file. Pure with respect to the store:
    /// the caller decides what to do with the unit.
    pub async fn ingest(&self, file: &UploadedFile) -> Result<FileContextUnit, IngestError> {
        self.admit(file)?;

        let mime_type = file.effective_mime();
        let bytes = file.read_bytes().await.map_err(|e| IngestError::ReadFailure {
            name: file.name.clone(),
            reason: e.to_string(),
        })?;

        let (kind, content) = self.normalize(file, &mime_type, bytes)?;
        tracing::debug!(
            name = %file.name,
            mime_type = %mime_type,
            kind = ?kind,
            content_len = content.len(),
            "file ingested"
        );

        Ok(FileContextUnit {
            name: file.name.clone(),
            mime_type,
            content,
            size_bytes: file.size_bytes,
            kind,
        })
    }

    fn admit(&self, file: &UploadedFile) -> Result<(), IngestError> {
        if file.size_bytes > self.policy.max_file_bytes {
            return Err(IngestError::SizeExceeded {
                name: file.name.clone(),
                size: file.size_bytes,
                limit: self.policy.max_file_bytes,
            });
        }

        if let Some(allowed) = &self.policy.allowed_extensions {
            let ext = extension_of(&file.name).map(str::to_lowercase);
            if !ext.is_some_and(|e| allowed.iter().any(|a| a == &e)) {
                return Err(IngestError::UnsupportedType {
                    name: file.name.clone(),
                    mime_type: file.effective_mime(),
                });
            }
        }
        Ok(())
    }

    fn normalize(
        &self,
        file: &UploadedFile,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(ContentKind, String), IngestError> {
        let extract = |result: Result<String, ExtractError>| {
            result.map_err(|source| IngestError::Extraction {
                name: file.name.clone(),
                source,
            })
        };

        match classify(mime_type, extension_of(&file.name)) {
            Classification::Pdf if self.policy.extract_documents => {
                Ok((ContentKind::Document, extract(doc_processor::extract_pdf(&bytes))?))
            }
            Classification::Word if self.policy.extract_documents => {
                Ok((ContentKind::Document, extract(doc_processor::extract_docx(&bytes))?))
            }
            Classification::Pdf | Classification::Word | Classification::Binary => {
                Ok((ContentKind::Binary, tag_binary(mime_type, &bytes)))
            }
            Classification::Text => {
                let text = String::from_utf8(bytes).map_err(|e| IngestError::ReadFailure {
                    name: file.name.clone(),
                    reason: e.to_string(),
                })?;
                let text = match text.strip_prefix('\u{feff}') {
                    Some(rest) => rest.to_string(),
                    None => text,
                };
                Ok((ContentKind::Text, text))
            }
        }
    }
}

/// Marker string carrying the base64 payload of a binary upload.
pub fn tag_binary(mime_type: &str, bytes: &[u8]) -> String {
    format!("[Binary content - {}] {}", mime_type, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_docx, make_pdf};
    use std::io::Write;

    fn make_policy(max_file_bytes: u64) -> UploadPolicy {
        UploadPolicy {
            max_file_bytes,
            ..UploadPolicy::default()
        }
    }

    #[test]
    fn classification_follows_mime_then_extension() {
        assert_eq!(classify("application/pdf", Some("bin")), Classification::Pdf);
        assert_eq!(classify("", Some("PDF")), Classification::Pdf);
        assert_eq!(classify(DOCX_MIME, None), Classification::Word);
        assert_eq!(classify("application/msword", Some("doc")), Classification::Binary);
        assert_eq!(classify("image/png", Some("png")), Classification::Binary);
        assert_eq!(classify("image/svg+xml", None), Classification::Text);
        assert_eq!(classify("image/tiff", Some("tif")), Classification::Binary);
        assert_eq!(classify("application/octet-stream", Some("exe")), Classification::Binary);
        assert_eq!(classify("text/x-python", Some("py")), Classification::Text);
        assert_eq!(classify("application/json", None), Classification::Text);
        assert_eq!(classify("application/rs", Some("rs")), Classification::Text);
        assert_eq!(classify("application/octet-stream", Some("dat")), Classification::Binary);
        assert_eq!(classify("application/octet-stream", Some("log")), Classification::Text);
        assert_eq!(classify("", None), Classification::Text);
    }

    #[test]
    fn classification_is_stable() {
        let pairs = [
            ("application/pdf", Some("pdf")),
            ("text/plain", Some("txt")),
            ("", Some("zip")),
            ("application/unknown", None),
        ];
        for (mime, ext) in pairs {
            assert_eq!(classify(mime, ext), classify(mime, ext));
        }
    }

    #[test]
    fn effective_mime_falls_back_to_extension() {
        let file = UploadedFile::from_bytes("Notes.MD", "", b"x".to_vec());
        assert_eq!(file.effective_mime(), "application/md");
        let file = UploadedFile::from_bytes("README", " ", b"x".to_vec());
        assert_eq!(file.effective_mime(), "application/octet-stream");
        let file = UploadedFile::from_bytes("a.txt", "text/plain", b"x".to_vec());
        assert_eq!(file.effective_mime(), "text/plain");
    }

    #[tokio::test]
    async fn text_file_is_decoded() {
        let normalizer = Normalizer::default();
        let file = UploadedFile::from_bytes("notes.txt", "text/plain", b"hello".to_vec());
        let unit = normalizer.ingest(&file).await.unwrap();
        assert_eq!(unit.content, "hello");
        assert_eq!(unit.kind, ContentKind::Text);
        assert_eq!(unit.size_bytes, 5);
        assert_eq!(unit.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn leading_byte_order_mark_is_dropped() {
        let normalizer = Normalizer::default();
        let file = UploadedFile::from_bytes("bom.txt", "text/plain", b"\xef\xbb\xbfhello".to_vec());
        let unit = normalizer.ingest(&file).await.unwrap();
        assert_eq!(unit.content, "hello");
        assert_eq!(unit.size_bytes, 8);
    }

    #[tokio::test]
    async fn invalid_utf8_is_read_failure() {
        let normalizer = Normalizer::default();
        let file = UploadedFile::from_bytes("data.csv", "text/csv", vec![0x66, 0xff, 0xfe]);
        let err = normalizer.ingest(&file).await.unwrap_err();
        assert!(matches!(err, IngestError::ReadFailure { .. }));
        assert_eq!(err.file_name(), "data.csv");
    }

    #[tokio::test]
    async fn binary_file_is_tagged_base64() {
        let normalizer = Normalizer::default();
        let file = UploadedFile::from_bytes("logo.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);
        let unit = normalizer.ingest(&file).await.unwrap();
        assert_eq!(unit.kind, ContentKind::Binary);
        assert_eq!(unit.content, "[Binary content - image/png] iVBORw==");
    }

    #[tokio::test]
    async fn pdf_is_extracted_by_page() {
        let file = UploadedFile::from_bytes("report.pdf", "application/pdf", make_pdf("Hello PDF"));
        let unit = Normalizer::default().ingest(&file).await.unwrap();
        assert_eq!(unit.kind, ContentKind::Document);
        assert!(unit.content.starts_with("--- Page 1 ---"));
        assert!(unit.content.contains("Hello PDF"));
    }

    #[tokio::test]
    async fn word_document_is_extracted_by_paragraph() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>First</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p></w:body></w:document>"#;
        // No declared type: the extension alone routes it to the extractor.
        let file = UploadedFile::from_bytes("minutes.docx", "", make_docx(xml));
        let unit = Normalizer::default().ingest(&file).await.unwrap();
        assert_eq!(unit.kind, ContentKind::Document);
        assert_eq!(unit.content, "First\nSecond");
        assert_eq!(unit.mime_type, "application/docx");
    }

    #[tokio::test]
    async fn pdf_is_tagged_when_extraction_disabled() {
        let normalizer = Normalizer::new(UploadPolicy {
            extract_documents: false,
            ..UploadPolicy::default()
        });
        let file = UploadedFile::from_bytes("scan.pdf", "application/pdf", b"%PDF".to_vec());
        let unit = normalizer.ingest(&file).await.unwrap();
        assert_eq!(unit.kind, ContentKind::Binary);
        assert!(unit.content.starts_with("[Binary content - application/pdf] "));
    }

    #[tokio::test]
    async fn broken_pdf_is_extraction_error() {
        let normalizer = Normalizer::default();
        let file = UploadedFile::from_bytes("broken.pdf", "application/pdf", b"not a pdf".to_vec());
        let err = normalizer.ingest(&file).await.unwrap_err();
        assert!(matches!(err, IngestError::Extraction { .. }));
        assert!(err.to_string().contains("broken.pdf"));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_before_reading() {
        let normalizer = Normalizer::new(make_policy(10));
        // The path does not exist; admission must fail first.
        let file = UploadedFile {
            name: "big.txt".into(),
            declared_mime: "text/plain".into(),
            size_bytes: 11,
            source: FileSource::Path("/definitely/missing/big.txt".into()),
        };
        let err = normalizer.ingest(&file).await.unwrap_err();
        assert!(matches!(err, IngestError::SizeExceeded { size: 11, limit: 10, .. }));
    }

    #[tokio::test]
    async fn size_limit_applies_to_every_type() {
        let normalizer = Normalizer::default();
        for (name, mime) in [("a.pdf", "application/pdf"), ("b.txt", "text/plain"), ("c", "")] {
            let file = UploadedFile {
                name: name.into(),
                declared_mime: mime.into(),
                size_bytes: DEFAULT_MAX_FILE_BYTES + 1,
                source: FileSource::Memory(Vec::new()),
            };
            assert!(matches!(
                normalizer.ingest(&file).await,
                Err(IngestError::SizeExceeded { .. })
            ));
        }
    }

    #[test]
    fn size_message_names_file_and_limit() {
        let err = IngestError::SizeExceeded {
            name: "movie.mp4".into(),
            size: 25 * 1024 * 1024,
            limit: DEFAULT_MAX_FILE_BYTES,
        };
        assert_eq!(err.to_string(), "File movie.mp4 is too large. Maximum size is 20MB.");
    }

    #[tokio::test]
    async fn allow_list_rejects_other_extensions() {
        let normalizer = Normalizer::new(UploadPolicy {
            allowed_extensions: Some(vec!["txt".into(), "md".into()]),
            ..UploadPolicy::default()
        });
        let ok = UploadedFile::from_bytes("a.TXT", "", b"fine".to_vec());
        assert!(normalizer.ingest(&ok).await.is_ok());

        let rejected = UploadedFile::from_bytes("a.exe", "", b"MZ".to_vec());
        assert!(matches!(
            normalizer.ingest(&rejected).await,
            Err(IngestError::UnsupportedType { .. })
        ));
    }

    #[tokio::test]
    async fn reads_from_disk() {
        let mut tmp = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        write!(tmp, "# Title\nbody").unwrap();

        let file = UploadedFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.size_bytes, 12);
        assert!(file.effective_mime().ends_with("/md"));

        let unit = Normalizer::default().ingest(&file).await.unwrap();
        assert_eq!(unit.content, "# Title\nbody");
    }
}
