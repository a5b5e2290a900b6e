//! Dedup linker: share jars with the server's `jars/` directory.
//!
//! Only names present in the reference directory are ever touched, so a
//! dependent directory never loses a file the reference cannot stand in for.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Replace every entry of `dependent` whose name also names a regular file in
/// `reference` with a relative symlink to that file.
///
/// Returns the number of entries replaced. Entries that already link to the
/// right place are left alone, so a second pass reports zero.
pub fn link_duplicates(reference: &Path, dependent: &Path) -> Result<usize> {
    if !dependent.is_dir() {
        return Ok(0);
    }

    let target_dir = relative_path(dependent, reference);
    let mut linked = 0usize;

    for name in reference_files(reference)? {
        let dep_path = dependent.join(&name);
        let Ok(meta) = fs::symlink_metadata(&dep_path) else {
            continue;
        };
        if meta.is_dir() {
            continue;
        }

        let target = target_dir.join(&name);
        if meta.file_type().is_symlink() && fs::read_link(&dep_path)? == target {
            continue;
        }

        fs::remove_file(&dep_path)
            .with_context(|| format!("removing duplicate '{}'", dep_path.display()))?;
        std::os::unix::fs::symlink(&target, &dep_path).with_context(|| {
            format!(
                "linking '{}' -> '{}'",
                dep_path.display(),
                target.display()
            )
        })?;
        linked += 1;
    }

    debug!(
        "linked {linked} duplicate(s) in {} against {}",
        dependent.display(),
        reference.display()
    );
    Ok(linked)
}

fn reference_files(reference: &Path) -> Result<BTreeSet<PathBuf>> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(reference)
        .with_context(|| format!("reading reference directory '{}'", reference.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.insert(PathBuf::from(entry.file_name()));
        }
    }
    Ok(names)
}

/// Path of `to` relative to the directory `from`, both given from the same base.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for part in &to[common..] {
        rel.push(part.as_os_str());
    }
    rel
}
