//! Per-site file storage. Every operation is scoped to one site's root
//! directory; `resolve` is the containment gate that keeps user-supplied
//! relative paths inside that root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;

use crate::error::{Error, Result};

/// Extensions whose content is returned decoded as text. Everything else
/// is reported as metadata only.
const TEXT_EXTENSIONS: &[&str] = &["html", "css", "js", "json", "txt", "md", "xml", "csv"];

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug)]
pub enum ReadResult {
    Text { content: String, size: u64 },
    Binary { size: u64 },
    Directory(Vec<FileEntry>),
}

#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    pub size: u64,
    /// Size of the file that was overwritten, 0 for a fresh file. The
    /// caller accounts storage with `size - previous_size`.
    pub previous_size: u64,
}

pub struct SiteStorage {
    base_dir: PathBuf,
}

impl SiteStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_dir: data_dir.join("sites"),
        }
    }

    /// Root directory for a site, derived only from ids. User-supplied
    /// names never participate, so renames cannot collide roots.
    #[must_use]
    pub fn root_for(&self, account_id: &str, site_id: &str) -> PathBuf {
        self.base_dir.join(account_id).join(site_id)
    }

    /// Resolves a user-supplied relative path against a site root.
    ///
    /// Rejects absolute paths, `..` segments, and NUL bytes lexically,
    /// then verifies against the real filesystem that the deepest existing
    /// ancestor of the candidate still descends from the root, which
    /// closes the symlink escape. Violations never reach the operation.
    pub fn resolve(&self, root: &Path, relative: &str) -> Result<PathBuf> {
        let cleaned = sanitize(relative).ok_or_else(|| {
            tracing::warn!(
                path = relative,
                root = %root.display(),
                "rejected path traversal attempt"
            );
            Error::Traversal
        })?;

        let root_real = std::fs::canonicalize(root).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound
            } else {
                Error::Io(e)
            }
        })?;

        let candidate = root_real.join(&cleaned);
        contained(&root_real, &candidate).inspect_err(|_| {
            tracing::warn!(
                path = relative,
                root = %root.display(),
                "rejected symlink escape"
            );
        })?;

        Ok(candidate)
    }

    /// Creates the site root (parents included). Idempotent.
    pub async fn ensure_root(&self, root: &Path) -> Result<()> {
        fs::create_dir_all(root).await?;
        Ok(())
    }

    /// Writes the generated welcome page a fresh site starts with.
    pub async fn write_default_index(
        &self,
        root: &Path,
        name: &str,
        full_domain: &str,
    ) -> Result<u64> {
        let html = default_index_html(name, full_domain);
        let outcome = self.write(root, "index.html", html.as_bytes()).await?;
        Ok(outcome.size)
    }

    pub async fn write(&self, root: &Path, relative: &str, bytes: &[u8]) -> Result<WriteOutcome> {
        let path = self.resolve(root, relative)?;

        let previous_size = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => 0,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;

        Ok(WriteOutcome {
            size: bytes.len() as u64,
            previous_size,
        })
    }

    /// Current size of a file, 0 when absent. Used to compute the storage
    /// delta of an overwrite before any bytes are written.
    pub async fn file_size(&self, root: &Path, relative: &str) -> Result<u64> {
        let path = self.resolve(root, relative)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Ok(0),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read(&self, root: &Path, relative: &str) -> Result<ReadResult> {
        let path = self.resolve(root, relative)?;

        let meta = fs::metadata(&path).await.map_err(io_not_found)?;

        if meta.is_dir() {
            return Ok(ReadResult::Directory(self.list_dir(&path).await?));
        }

        let size = meta.len();
        if is_text_path(&path) {
            let content = fs::read_to_string(&path).await?;
            Ok(ReadResult::Text { content, size })
        } else {
            Ok(ReadResult::Binary { size })
        }
    }

    /// Raw bytes of a file, used by host resolution to serve site content.
    pub async fn read_bytes(&self, root: &Path, relative: &str) -> Result<Vec<u8>> {
        let path = self.resolve(root, relative)?;
        fs::read(&path).await.map_err(|e| io_not_found(e))
    }

    pub async fn list(&self, root: &Path, relative: &str) -> Result<Vec<FileEntry>> {
        let path = self.resolve(root, relative)?;

        let meta = fs::metadata(&path).await.map_err(io_not_found)?;
        if !meta.is_dir() {
            return Err(Error::BadRequest("Not a directory".to_string()));
        }

        self.list_dir(&path).await
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: if meta.is_dir() { "directory" } else { "file" },
                size: meta.len(),
                modified,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Removes a file or subtree and returns the bytes freed. Deleting an
    /// already-absent path is success (0 bytes) so retries are safe.
    pub async fn delete(&self, root: &Path, relative: &str) -> Result<u64> {
        let path = match self.resolve(root, relative) {
            Ok(path) => path,
            Err(Error::NotFound) => return Ok(0),
            Err(e) => return Err(e),
        };

        let meta = match fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        if meta.is_dir() {
            let freed = subtree_size(path.clone()).await?;
            fs::remove_dir_all(&path).await?;
            Ok(freed)
        } else {
            let freed = meta.len();
            fs::remove_file(&path).await?;
            Ok(freed)
        }
    }

    /// Moves a file within the same root. Both ends pass containment.
    /// Returns the size of a destination file the rename replaced, 0 when
    /// the destination was fresh, so the caller can release the clobbered
    /// bytes from storage accounting.
    pub async fn rename(&self, root: &Path, old: &str, new: &str) -> Result<u64> {
        let old_path = self.resolve(root, old)?;
        let new_path = self.resolve(root, new)?;

        match fs::metadata(&old_path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(e.into()),
        }

        let clobbered = match fs::metadata(&new_path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => 0,
        };

        if let Some(parent) = new_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&old_path, &new_path).await?;
        Ok(clobbered)
    }

    /// Recursively deletes a site's root. Absent root is success, so
    /// cascade deletes and retries are idempotent.
    pub async fn remove_root(&self, root: &Path) -> Result<()> {
        match fs::remove_dir_all(root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn io_not_found(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound
    } else {
        Error::Io(e)
    }
}

/// Lexical pass: produce a clean relative path or None for anything that
/// could step above the root. An empty path means the root itself.
fn sanitize(relative: &str) -> Option<PathBuf> {
    if relative.contains('\0') {
        return None;
    }

    let mut cleaned = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(cleaned)
}

/// Walks up from `candidate` to its deepest existing ancestor and checks
/// that the ancestor's real path still descends from the root. Catches
/// symlinks that point outside even when the tail does not exist yet.
fn contained(root_real: &Path, candidate: &Path) -> Result<()> {
    let mut probe = candidate.to_path_buf();
    loop {
        match std::fs::canonicalize(&probe) {
            Ok(real) => {
                if real.starts_with(root_real) {
                    return Ok(());
                }
                return Err(Error::Traversal);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !probe.pop() {
                    return Err(Error::Traversal);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn is_text_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            TEXT_EXTENSIONS.contains(&ext.as_str())
        })
}

async fn subtree_size(path: PathBuf) -> std::io::Result<u64> {
    let meta = fs::symlink_metadata(&path).await?;
    if !meta.is_dir() {
        return Ok(meta.len());
    }

    let mut total = 0;
    let mut dir = fs::read_dir(&path).await?;
    while let Some(entry) = dir.next_entry().await? {
        total += Box::pin(subtree_size(entry.path())).await?;
    }
    Ok(total)
}

fn default_index_html(name: &str, full_domain: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{name}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 40px;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
        }}
        .container {{
            text-align: center;
            color: white;
        }}
        h1 {{
            font-size: 3em;
            margin-bottom: 20px;
        }}
        p {{
            font-size: 1.2em;
            opacity: 0.9;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Welcome to {name}</h1>
        <p>Your site is now live at {full_domain}</p>
    </div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SiteStorage, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let storage = SiteStorage::new(temp_dir.path());
        let root = storage.root_for("acct", "site");
        storage.ensure_root(&root).await.unwrap();
        (temp_dir, storage, root)
    }

    #[test]
    fn test_root_is_derived_from_ids_only() {
        let storage = SiteStorage::new(Path::new("/data"));
        assert_eq!(
            storage.root_for("a1", "s1"),
            Path::new("/data/sites/a1/s1")
        );
    }

    #[tokio::test]
    async fn test_write_and_read_round_trip() {
        let (_tmp, storage, root) = setup().await;

        let outcome = storage.write(&root, "index.html", b"<h1>hi</h1>").await.unwrap();
        assert_eq!(outcome.size, 11);
        assert_eq!(outcome.previous_size, 0);

        match storage.read(&root, "index.html").await.unwrap() {
            ReadResult::Text { content, size } => {
                assert_eq!(content, "<h1>hi</h1>");
                assert_eq!(size, 11);
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_overwrite_reports_previous_size() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "a.txt", b"12345").await.unwrap();
        let outcome = storage.write(&root, "a.txt", b"12").await.unwrap();
        assert_eq!(outcome.size, 2);
        assert_eq!(outcome.previous_size, 5);
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let (_tmp, storage, root) = setup().await;

        storage
            .write(&root, "css/theme/dark.css", b"body{}")
            .await
            .unwrap();
        assert!(root.join("css/theme/dark.css").is_file());
    }

    #[tokio::test]
    async fn test_binary_extension_returns_metadata_only() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "logo.png", &[0x89, 0x50]).await.unwrap();
        match storage.read(&root, "logo.png").await.unwrap() {
            ReadResult::Binary { size } => assert_eq!(size, 2),
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_traversal_is_rejected_without_mutation() {
        let (tmp, storage, root) = setup().await;

        let outside = tmp.path().join("outside.txt");
        for path in [
            "../outside.txt",
            "..",
            "a/../../outside.txt",
            "/etc/passwd",
            "a/b/../../../outside.txt",
        ] {
            let result = storage.write(&root, path, b"pwned").await;
            assert!(
                matches!(result, Err(Error::Traversal)),
                "{path} should be traversal"
            );
        }
        assert!(!outside.exists());
        assert!(!Path::new("/etc/passwd.pwned").exists());
    }

    #[tokio::test]
    async fn test_nul_byte_is_rejected() {
        let (_tmp, storage, root) = setup().await;
        let result = storage.write(&root, "bad\0name", b"x").await;
        assert!(matches!(result, Err(Error::Traversal)));
    }

    #[tokio::test]
    async fn test_dot_segments_are_collapsed_safely() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "./a/./b.txt", b"ok").await.unwrap();
        assert!(root.join("a/b.txt").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_rejected() {
        let (tmp, storage, root) = setup().await;

        let outside = tmp.path().join("elsewhere");
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let result = storage.write(&root, "link/escape.txt", b"x").await;
        assert!(matches!(result, Err(Error::Traversal)));
        assert!(!outside.join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_returns_freed_bytes() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "big.txt", &[0u8; 100]).await.unwrap();
        let freed = storage.delete(&root, "big.txt").await.unwrap();
        assert_eq!(freed, 100);
    }

    #[tokio::test]
    async fn test_delete_subtree_sums_sizes() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "dir/a.txt", &[0u8; 30]).await.unwrap();
        storage.write(&root, "dir/sub/b.txt", &[0u8; 20]).await.unwrap();

        let freed = storage.delete(&root, "dir").await.unwrap();
        assert_eq!(freed, 50);
        assert!(!root.join("dir").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_idempotent() {
        let (_tmp, storage, root) = setup().await;
        assert_eq!(storage.delete(&root, "nope.txt").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_root_is_idempotent() {
        let (_tmp, storage, root) = setup().await;
        storage.write(&root, "index.html", b"x").await.unwrap();

        storage.remove_root(&root).await.unwrap();
        assert!(!root.exists());
        storage.remove_root(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_within_root() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "old.txt", b"data").await.unwrap();
        let clobbered = storage.rename(&root, "old.txt", "pages/new.txt").await.unwrap();
        assert_eq!(clobbered, 0);

        assert!(!root.join("old.txt").exists());
        assert!(root.join("pages/new.txt").is_file());
    }

    #[tokio::test]
    async fn test_rename_over_existing_reports_clobbered_size() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "a.txt", &[0u8; 50]).await.unwrap();
        storage.write(&root, "b.txt", &[0u8; 100]).await.unwrap();

        let clobbered = storage.rename(&root, "a.txt", "b.txt").await.unwrap();
        assert_eq!(clobbered, 100);

        assert!(!root.join("a.txt").exists());
        assert_eq!(root.join("b.txt").metadata().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_rename_rejects_escaping_target() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "old.txt", b"data").await.unwrap();
        let result = storage.rename(&root, "old.txt", "../stolen.txt").await;
        assert!(matches!(result, Err(Error::Traversal)));
        assert!(root.join("old.txt").is_file());
    }

    #[tokio::test]
    async fn test_rename_missing_source_is_not_found() {
        let (_tmp, storage, root) = setup().await;
        let result = storage.rename(&root, "ghost.txt", "new.txt").await;
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn test_list_directory_entries() {
        let (_tmp, storage, root) = setup().await;

        storage.write(&root, "a.txt", b"1").await.unwrap();
        storage.write(&root, "sub/b.txt", b"22").await.unwrap();

        let entries = storage.list(&root, "").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].kind, "file");
        assert_eq!(entries[1].name, "sub");
        assert_eq!(entries[1].kind, "directory");
    }

    #[tokio::test]
    async fn test_list_on_file_is_bad_request() {
        let (_tmp, storage, root) = setup().await;
        storage.write(&root, "a.txt", b"1").await.unwrap();
        let result = storage.list(&root, "a.txt").await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_default_index_mentions_site() {
        let (_tmp, storage, root) = setup().await;

        storage
            .write_default_index(&root, "My Portfolio", "folio.perch.local")
            .await
            .unwrap();

        match storage.read(&root, "index.html").await.unwrap() {
            ReadResult::Text { content, .. } => {
                assert!(content.contains("My Portfolio"));
                assert!(content.contains("folio.perch.local"));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }
}
