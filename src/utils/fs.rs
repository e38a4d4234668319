//! File system utilities used by the provisioning pipeline.
//!
//! Synchronous helpers (`ensure_dir`, `copy_dir`, `atomic_write`) are used from
//! blocking contexts such as tool-cache seeding; the async helpers wrap
//! `tokio::fs` for the suspension points of a run (stat, recursive remove).

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Ensures a directory exists, creating it and all parent directories if necessary.
///
/// # Errors
///
/// Returns an error if the path exists but is not a directory, or creation fails.
///
/// # Examples
///
/// ```rust,no_run
/// use setup_wptl::utils::fs::ensure_dir;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// ensure_dir(Path::new("/tmp/wp/wordpress-tests-lib"))?;
/// # Ok(())
/// # }
/// ```
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!(
                "Failed to create directory: {}\n\nCheck directory permissions and path validity",
                path.display()
            )
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }

    Ok(())
}

/// Returns `true` if `path` exists and is a directory.
///
/// Symbolic links are followed, so a link to a directory counts. Any stat
/// failure is reported as `false`.
pub async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// Removes a file, symbolic link or directory tree. Missing paths are not an error.
///
/// Symbolic links are removed without touching their target, so a tree that
/// was materialized from the tool cache is unlinked rather than deleted.
pub async fn remove_path(path: &Path) -> Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to stat {}", path.display()));
        }
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        remove_file_or_link(path).await
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

#[cfg(windows)]
async fn remove_file_or_link(path: &Path) -> std::io::Result<()> {
    // Directory junctions and symlinks report as files but need remove_dir.
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(_) => tokio::fs::remove_dir(path).await,
    }
}

#[cfg(not(windows))]
async fn remove_file_or_link(path: &Path) -> std::io::Result<()> {
    tokio::fs::remove_file(path).await
}

/// Recursively copies a directory and all its contents to a new location.
///
/// - Creates destination directory if it doesn't exist
/// - Copies only regular files and directories (skips symlinks and special files)
/// - Overwrites existing files in the destination
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!("Failed to copy file from {} to {}", src_path.display(), dst_path.display())
            })?;
        }
        // Skip symlinks and other file types
    }

    Ok(())
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// Content goes to a sibling `.tmp` file that is synced and then renamed over
/// the target, so readers never see a partially written file. Parent
/// directories are created when missing.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path).with_context(|| {
            format!(
                "Failed to create temp file: {}\n\nCheck file permissions and that directory exists",
                temp_path.display()
            )
        })?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Reads and parses a JSON file.
pub fn read_json_file<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON from file: {}", path.display()))
}

/// Writes data as pretty-printed JSON to a file atomically.
pub fn write_json_file<T>(path: &Path, data: &T) -> Result<()>
where
    T: serde::Serialize,
{
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())
        .with_context(|| format!("Failed to write JSON file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir() {
        let temp = tempdir().unwrap();
        let test_dir = temp.path().join("a").join("b");

        assert!(!test_dir.exists());
        ensure_dir(&test_dir).unwrap();
        assert!(test_dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_on_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("file.txt");
        std::fs::write(&file_path, "content").unwrap();

        assert!(ensure_dir(&file_path).is_err());
    }

    #[tokio::test]
    async fn test_is_dir() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("file.txt");
        std::fs::write(&file_path, "content").unwrap();

        assert!(is_dir(temp.path()).await);
        assert!(!is_dir(&file_path).await);
        assert!(!is_dir(&temp.path().join("missing")).await);
    }

    #[tokio::test]
    async fn test_remove_path_handles_files_dirs_and_missing() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("tree");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested").join("f.txt"), "x").unwrap();
        let file = temp.path().join("wordpress.zip");
        std::fs::write(&file, "zip").unwrap();

        remove_path(&dir).await.unwrap();
        remove_path(&file).await.unwrap();
        remove_path(&temp.path().join("never-existed")).await.unwrap();

        assert!(!dir.exists());
        assert!(!file.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remove_path_unlinks_without_touching_target() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("cached");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("keep.txt"), "x").unwrap();
        let link = temp.path().join("wordpress");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        remove_path(&link).await.unwrap();

        assert!(std::fs::symlink_metadata(&link).is_err());
        assert!(target.join("keep.txt").exists());
    }

    #[test]
    fn test_copy_dir() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::write(src.join("a.txt"), "a").unwrap();
        std::fs::write(src.join("sub").join("b.txt"), "b").unwrap();

        let dst = temp.path().join("dst");
        copy_dir(&src, &dst).unwrap();

        assert_eq!(std::fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(dst.join("sub").join("b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_json_roundtrip_through_atomic_write() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("data.json");

        write_json_file(&path, &vec!["a".to_string(), "b".to_string()]).unwrap();
        let back: Vec<String> = read_json_file(&path).unwrap();

        assert_eq!(back, vec!["a", "b"]);
        assert!(!path.with_extension("tmp").exists());
    }
}
