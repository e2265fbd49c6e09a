/// Storage of uploaded post images
///
/// Files land below `<root>/posts/` and are referenced by their path relative
/// to the media root (`posts/<name>`), which is what the `posts.image`
/// column stores.
use async_trait::async_trait;
use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Subdirectory of the media root that post images are written to
pub const POST_IMAGE_DIR: &str = "posts";

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Persist `bytes` under a name derived from `filename` and return the
    /// stored path relative to the media root.
    async fn save(&self, filename: &str, bytes: Bytes) -> std::io::Result<String>;
}

#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep the final path component and a safe character set.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

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
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", name, suffix),
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, filename: &str, bytes: Bytes) -> std::io::Result<String> {
        let dir = self.root.join(POST_IMAGE_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let mut name = sanitize_filename(filename);
        loop {
            let path = dir.join(&name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&bytes).await?;
                    file.flush().await?;
                    info!(path = %path.display(), size = bytes.len(), "Stored uploaded image");
                    return Ok(format!("{}/{}", POST_IMAGE_DIR, name));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let suffix: String = rand::thread_rng()
                        .sample_iter(&Alphanumeric)
                        .take(7)
                        .map(char::from)
                        .collect();
                    debug!(taken = %name, "Media name taken, adding suffix");
                    name = with_suffix(&sanitize_filename(filename), &suffix);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\my pic.gif"), "my_pic.gif");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix("small.gif", "abc1234"), "small_abc1234.gif");
        assert_eq!(with_suffix("noext", "abc1234"), "noext_abc1234");
    }

    #[tokio::test]
    async fn save_writes_below_posts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalMediaStorage::new(dir.path());

        let first = storage
            .save("small.gif", Bytes::from_static(b"GIF89a"))
            .await
            .unwrap();
        assert_eq!(first, "posts/small.gif");
        assert!(dir.path().join("posts/small.gif").exists());

        let second = storage
            .save("small.gif", Bytes::from_static(b"GIF89a"))
            .await
            .unwrap();
        assert_ne!(second, first);
        assert!(second.starts_with("posts/small_"));
        assert!(second.ends_with(".gif"));
    }
}
