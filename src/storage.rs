use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{CuratelaError, Result};
use crate::fmt::fold_diacritics;

/// The single bucket holding attachments and documents.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, path: &str) -> Result<Vec<u8>>;
    async fn remove(&self, path: &str) -> Result<()>;
    fn public_url(&self, path: &str) -> String;
}

/// Keep only the last path component and map it onto `[A-Za-z0-9._-]`.
pub fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("arquivo");
    let folded = fold_diacritics(base);
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches(|c| c == '_' || c == '.').to_string();
    if trimmed.is_empty() {
        "arquivo".to_string()
    } else {
        trimmed
    }
}

/// `{uuid}-{sanitized filename}`
pub fn object_path(filename: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_filename(filename))
}

pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Local bucket
// ---------------------------------------------------------------------------

pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() || path.contains('/') || path.contains('\\') || path.contains("..") {
            return Err(CuratelaError::Validation(format!("Invalid storage path: {path}")));
        }
        Ok(self.root.join(path))
    }
}

impl ObjectStore for LocalBucket {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&target, bytes).await?;
        log::debug!(target: "storage", "stored {path} ({} bytes)", bytes.len());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CuratelaError::NotFound(format!("object {path}")),
            _ => CuratelaError::Io(e),
        })
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("file://{}", self.root.join(path).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Recibo Farmácia (1).jpg"), "Recibo_Farmacia_1_.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("???"), "arquivo");
    }

    #[test]
    fn test_object_path_shape() {
        let path = object_path("extrato março.pdf");
        assert!(path.ends_with("-extrato_marco.pdf"), "got: {path}");
        // 36-char uuid, dash, name
        assert_eq!(path.len(), 36 + 1 + "extrato_marco.pdf".len());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("a.PDF")), "application/pdf");
        assert_eq!(mime_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_local_bucket_put_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = LocalBucket::new(dir.path().join("bucket"));
        bucket.put("x-recibo.jpg", b"jpeg").await.unwrap();
        assert_eq!(bucket.get("x-recibo.jpg").await.unwrap(), b"jpeg");
        assert!(bucket.public_url("x-recibo.jpg").starts_with("file://"));
        bucket.remove("x-recibo.jpg").await.unwrap();
        assert!(matches!(
            bucket.get("x-recibo.jpg").await,
            Err(CuratelaError::NotFound(_))
        ));
        // removing twice is fine
        bucket.remove("x-recibo.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_bucket_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = LocalBucket::new(dir.path());
        assert!(bucket.put("../escape", b"x").await.is_err());
    }
}
