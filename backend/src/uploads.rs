//! On-disk storage for uploaded images. Files live flat in the upload
//! directory and are addressed by a public path of the form `uploads/<name>`.

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};

pub const PUBLIC_PREFIX: &str = "uploads/";

/// Detects the image format from its leading bytes.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

/// Writes `bytes` under a fresh random name and returns its public path.
pub async fn store(dir: &Path, extension: &str, bytes: &[u8]) -> io::Result<String> {
    tokio::fs::create_dir_all(dir).await?;
    let name = format!(
        "{}-{:016x}.{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u64>(),
        extension
    );
    tokio::fs::write(dir.join(&name), bytes).await?;
    Ok(format!("{PUBLIC_PREFIX}{name}"))
}

/// Maps a public path back onto the upload directory. Anything that is not a
/// single plain file name under the prefix is refused.
pub fn resolve(dir: &Path, public_path: &str) -> Option<PathBuf> {
    let name = public_path.strip_prefix(PUBLIC_PREFIX).unwrap_or(public_path);
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    valid.then(|| dir.join(name))
}

/// Best-effort removal; a missing file is not an error.
pub async fn remove(dir: &Path, public_path: &str) {
    let Some(path) = resolve(dir, public_path) else {
        tracing::warn!(path = public_path, "refusing to remove file outside upload dir");
        return;
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed upload"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "failed to remove upload: {e}"),
    }
}

/// Removes an already stored file when the write that should reference it
/// failed, then hands the result back unchanged.
pub async fn discard_on_error<T, E>(dir: &Path, public_path: &str, result: Result<T, E>) -> Result<T, E> {
    if result.is_err() {
        remove(dir, public_path).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(sniff_image(PNG), Some("png"));
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg"));
        assert_eq!(sniff_image(b"GIF89a...."), Some("gif"));
        assert_eq!(sniff_image(b"RIFF\0\0\0\0WEBPVP8 "), Some("webp"));
        assert_eq!(sniff_image(b"%PDF-1.7"), None);
        assert_eq!(sniff_image(b""), None);
    }

    #[test]
    fn resolve_rejects_traversal() {
        let dir = Path::new("/srv/uploads");
        assert_eq!(
            resolve(dir, "uploads/20261016-00ff.png"),
            Some(dir.join("20261016-00ff.png"))
        );
        assert_eq!(resolve(dir, "uploads/../etc/passwd"), None);
        assert_eq!(resolve(dir, "uploads/a/b.png"), None);
        assert_eq!(resolve(dir, "uploads/.hidden"), None);
        assert_eq!(resolve(dir, "uploads/"), None);
        assert_eq!(resolve(dir, "/etc/passwd"), None);
    }

    #[tokio::test]
    async fn store_then_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let public = store(tmp.path(), "png", PNG).await.unwrap();
        assert!(public.starts_with(PUBLIC_PREFIX) && public.ends_with(".png"));

        let on_disk = resolve(tmp.path(), &public).unwrap();
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), PNG);

        remove(tmp.path(), &public).await;
        assert!(!on_disk.exists());
        // Second removal is a no-op.
        remove(tmp.path(), &public).await;
    }

    #[tokio::test]
    async fn failed_write_discards_the_stored_file() {
        let tmp = tempfile::tempdir().unwrap();
        let kept = store(tmp.path(), "png", PNG).await.unwrap();
        let dropped = store(tmp.path(), "png", PNG).await.unwrap();

        let ok: Result<u8, &str> = discard_on_error(tmp.path(), &kept, Ok(1)).await;
        assert_eq!(ok, Ok(1));
        assert!(resolve(tmp.path(), &kept).unwrap().exists());

        let err: Result<u8, &str> = discard_on_error(tmp.path(), &dropped, Err("insert failed")).await;
        assert_eq!(err, Err("insert failed"));
        assert!(!resolve(tmp.path(), &dropped).unwrap().exists());
    }

    #[tokio::test]
    async fn stored_names_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let a = store(tmp.path(), "jpg", b"a").await.unwrap();
        let b = store(tmp.path(), "jpg", b"b").await.unwrap();
        assert_ne!(a, b);
    }
}
