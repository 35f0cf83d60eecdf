/// Document storage
///
/// Bytes go through [`StorageBackend`]; the database only keeps the key.
/// Keys have the shape `documents/{user_id}/{document_id}/{filename}` with
/// the filename sanitized by [`sanitize_filename`].
///
/// # Example
///
/// ```no_run
/// use a3e_shared::storage::{document_key, local::LocalStorage, StorageBackend};
/// use bytes::Bytes;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), a3e_shared::storage::StorageError> {
/// let storage = LocalStorage::new("./data/uploads");
/// let key = document_key(Uuid::new_v4(), Uuid::new_v4(), "QEP Draft (v2).pdf");
/// storage.put(&key, Bytes::from_static(b"%PDF-1.7"), "application/pdf").await?;
/// assert!(storage.exists(&key).await?);
/// # Ok(())
/// # }
/// ```

pub mod local;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

/// Largest accepted upload (25 MiB)
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Accepted file extensions (lowercase)
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "txt", "md", "csv", "xlsx", "pptx", "rtf"];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// `local` or `s3`; stored alongside each document
    fn name(&self) -> &'static str;

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Rejects keys that could escape the storage root
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");

    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

const MAX_FILENAME_LEN: usize = 200;
const MAX_EXTENSION_LEN: usize = 16;

/// Keeps `[A-Za-z0-9._-]`, maps everything else to `_`, and strips any
/// directory part the client sent
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    let mut name = if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    };

    if name.len() > MAX_FILENAME_LEN {
        // An extension that long is not a real one; cut it with the rest
        let ext = extension(&name)
            .filter(|e| e.len() <= MAX_EXTENSION_LEN)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        name.truncate(MAX_FILENAME_LEN - ext.len());
        name.push_str(&ext);
    }
    name
}

pub fn document_key(user_id: Uuid, document_id: Uuid, filename: &str) -> String {
    format!("documents/{}/{}/{}", user_id, document_id, sanitize_filename(filename))
}

/// Lowercased extension without the dot
pub fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_allowed_extension(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Content type by extension, for parts that arrive without one
pub fn guess_content_type(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("doc") => "application/msword",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        Some("rtf") => "application/rtf",
        _ => "application/octet-stream",
    }
}

/// Hex SHA-256 of an upload
pub fn content_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data))
}

/// Which backend to build, from `STORAGE_*` / `S3_*` settings
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local { root: std::path::PathBuf },
    S3(s3::S3Config),
}

impl StorageConfig {
    /// Reads `STORAGE_BACKEND` (`local` or `s3`) and the matching settings
    /// through `lookup`, so callers can pass `std::env::var` or a test map
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StorageError> {
        let backend = lookup("STORAGE_BACKEND").unwrap_or_else(|| "local".to_string());

        match backend.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageConfig::Local {
                root: lookup("STORAGE_LOCAL_ROOT")
                    .unwrap_or_else(|| "./data/uploads".to_string())
                    .into(),
            }),
            "s3" => {
                let required = |key: &str| {
                    lookup(key).ok_or_else(|| StorageError::Backend(format!("{key} is required for S3 storage")))
                };

                Ok(StorageConfig::S3(s3::S3Config {
                    endpoint: lookup("S3_ENDPOINT"),
                    region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    bucket: required("S3_BUCKET")?,
                    access_key: required("S3_ACCESS_KEY")?,
                    secret_key: required("S3_SECRET_KEY")?,
                }))
            }
            other => Err(StorageError::Backend(format!("Unknown STORAGE_BACKEND: {other}"))),
        }
    }

    pub fn build(&self) -> Result<std::sync::Arc<dyn StorageBackend>, StorageError> {
        Ok(match self {
            StorageConfig::Local { root } => std::sync::Arc::new(local::LocalStorage::new(root.clone())),
            StorageConfig::S3(config) => std::sync::Arc::new(s3::S3Storage::new(config.clone())?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("documents/u/d/file.pdf").is_ok());
        for bad in ["", "/etc/passwd", "documents/../secret", "a//b", "a/./b", "a\\b", "a/b/"] {
            assert!(validate_key(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("QEP Draft (v2).pdf"), "QEP_Draft__v2_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\report.docx"), "report.docx");
        assert_eq!(sanitize_filename("..."), "document");
        assert_eq!(sanitize_filename("résumé.txt"), "r_sum_.txt");

        let long = format!("{}.pdf", "a".repeat(300));
        let cleaned = sanitize_filename(&long);
        assert_eq!(cleaned.len(), 200);
        assert!(cleaned.ends_with(".pdf"));
    }

    #[test]
    fn test_sanitize_filename_with_oversized_extension() {
        let cleaned = sanitize_filename(&format!("a.{}", "x".repeat(250)));
        assert_eq!(cleaned.len(), 200);
        assert!(cleaned.starts_with("a.xxx"));

        let cleaned = sanitize_filename(&format!("{}.{}", "b".repeat(150), "x".repeat(150)));
        assert_eq!(cleaned.len(), 200);
    }

    #[test]
    fn test_document_key_is_valid() {
        let key = document_key(Uuid::nil(), Uuid::nil(), "../x y.pdf");
        assert_eq!(
            key,
            "documents/00000000-0000-0000-0000-000000000000/00000000-0000-0000-0000-000000000000/x_y.pdf"
        );
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn test_extensions() {
        assert!(is_allowed_extension("Self-Study.PDF"));
        assert!(is_allowed_extension("minutes.md"));
        assert!(!is_allowed_extension("payload.exe"));
        assert!(!is_allowed_extension("noextension"));
        assert!(!is_allowed_extension(".pdf"));
        assert_eq!(guess_content_type("data.CSV"), "text/csv");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }

    #[test]
    fn test_storage_config_from_lookup() {
        let vars = std::collections::HashMap::from([
            ("STORAGE_BACKEND", "s3"),
            ("S3_BUCKET", "docs"),
            ("S3_ACCESS_KEY", "ak"),
            ("S3_SECRET_KEY", "sk"),
        ]);
        let config = StorageConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        match config {
            StorageConfig::S3(s3) => {
                assert_eq!(s3.bucket, "docs");
                assert_eq!(s3.region, "us-east-1");
                assert_eq!(s3.endpoint, None);
            }
            other => panic!("unexpected {other:?}"),
        }

        let local = StorageConfig::from_lookup(|_| None).unwrap();
        assert!(matches!(local, StorageConfig::Local { .. }));

        let missing = StorageConfig::from_lookup(|k| (k == "STORAGE_BACKEND").then(|| "s3".to_string()));
        assert!(matches!(missing, Err(StorageError::Backend(_))));
    }
}
