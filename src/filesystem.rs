//! Filesystem helpers shared by the layout, dedup and archive stages.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Recursively copy a directory, preserving symlinks.
///
/// Symlinks are recreated with their original target rather than followed,
/// so links produced by deduplication survive staging copies unchanged.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)
            .with_context(|| format!("Failed to create directory: {}", dst.display()))?;
    }

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        let file_type = entry.file_type()?;

        if file_type.is_symlink() {
            let target = fs::read_link(&src_path)?;
            if dst_path.exists() || dst_path.is_symlink() {
                fs::remove_file(&dst_path)?;
            }
            std::os::unix::fs::symlink(&target, &dst_path)
                .with_context(|| format!("Failed to create symlink: {}", dst_path.display()))?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)
                .with_context(|| format!("Failed to copy file: {}", src_path.display()))?;
        }
    }

    Ok(())
}

/// Copy a single file into `dst_dir`, keeping its file name.
pub fn copy_into(src: &Path, dst_dir: &Path) -> Result<()> {
    let name = src
        .file_name()
        .with_context(|| format!("source has no file name: {}", src.display()))?;
    let dst = dst_dir.join(name);
    fs::copy(src, &dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Remove `path` (file, symlink or directory) if anything is there.
pub fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("Failed to remove: {}", path.display()))
    }
}

/// Destroy whatever is at `path` and create an empty directory in its place.
pub fn recreate_dir(path: &Path) -> Result<()> {
    remove_path(path)?;
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_recursive() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");

        fs::create_dir_all(src.join("subdir")).unwrap();
        fs::write(src.join("file.txt"), "hello").unwrap();
        fs::write(src.join("subdir/nested.txt"), "world").unwrap();
        std::os::unix::fs::symlink("file.txt", src.join("link")).unwrap();

        copy_dir_recursive(&src, &dst).unwrap();

        assert!(dst.join("file.txt").exists());
        assert!(dst.join("subdir/nested.txt").exists());
        assert!(dst.join("link").is_symlink());
        assert_eq!(
            fs::read_link(dst.join("link")).unwrap().to_str().unwrap(),
            "file.txt"
        );
    }

    #[test]
    fn test_copy_dir_recursive_keeps_dangling_relative_links() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src/beeline-jars");
        let dst = temp.path().join("dst/beeline-jars");
        fs::create_dir_all(&src).unwrap();
        std::os::unix::fs::symlink("../jars/a.jar", src.join("a.jar")).unwrap();

        copy_dir_recursive(&src, &dst).unwrap();

        assert_eq!(
            fs::read_link(dst.join("a.jar")).unwrap(),
            Path::new("../jars/a.jar")
        );
    }

    #[test]
    fn test_recreate_dir_drops_old_contents() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dist");
        fs::create_dir_all(dir.join("jars")).unwrap();
        fs::write(dir.join("jars/stale.jar"), "old").unwrap();

        recreate_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_remove_path_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        assert!(remove_path(&temp.path().join("nope")).is_ok());
    }

    #[test]
    fn test_copy_into() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.jar");
        let dst = temp.path().join("out");
        fs::write(&src, "jar").unwrap();
        fs::create_dir_all(&dst).unwrap();

        copy_into(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a.jar")).unwrap(), "jar");
    }
}
