//! Filesystem utilities.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Whether a directory exists and contains at least one entry.
pub fn dir_is_nonempty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(path)
        .with_context(|| format!("failed to read directory: {}", path.display()))?;
    Ok(entries.next().is_some())
}

/// Write file contents with a path-bearing error.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write: {}", path.display()))
}

/// Recursively copy a directory.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory: {}", dst.display()))?;

    for entry in
        fs::read_dir(src).with_context(|| format!("failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    src_path.display(),
                    dst_path.display()
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_is_nonempty() {
        let tmp = TempDir::new().unwrap();
        assert!(!dir_is_nonempty(tmp.path()).unwrap());
        write_file(&tmp.path().join("a.tf"), "x").unwrap();
        assert!(dir_is_nonempty(tmp.path()).unwrap());
        assert!(!dir_is_nonempty(&tmp.path().join("missing")).unwrap());
    }

    #[test]
    fn test_copy_dir_all() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        ensure_dir(&src.join("nested")).unwrap();
        write_file(&src.join("nested/file.tf"), "content").unwrap();

        copy_dir_all(&src, &dst).unwrap();
        let copied = fs::read_to_string(dst.join("nested/file.tf")).unwrap();
        assert_eq!(copied, "content");
    }
}
