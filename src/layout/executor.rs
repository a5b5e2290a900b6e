//! Layout executor - carries out a [`DistributionTree`] on disk.
//!
//! The target root is always destroyed and rebuilt, so a rerun never leaks
//! artifacts from an earlier tree.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{DistributionTree, Need, Op};
use crate::dedup;
use crate::filesystem::{copy_dir_recursive, copy_into, recreate_dir};

/// What the executor did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutReport {
    pub placed: usize,
    pub skipped: usize,
    pub linked: usize,
}

/// Outcome of a single op.
enum Applied {
    Placed,
    Linked(usize),
    Missing(String),
}

/// Destroy the tree root, create the skeleton, then apply every placement in order.
pub fn assemble(tree: &DistributionTree) -> Result<LayoutReport> {
    recreate_dir(&tree.root)
        .with_context(|| format!("resetting distribution directory '{}'", tree.root.display()))?;

    for dir in &tree.dirs {
        let path = tree.root.join(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("creating distribution directory '{}'", path.display()))?;
    }

    let mut report = LayoutReport::default();
    for placement in &tree.placements {
        match apply(&placement.op)? {
            Applied::Placed => report.placed += 1,
            Applied::Linked(n) => report.linked += n,
            Applied::Missing(what) => match placement.need {
                Need::Required => bail!("missing required artifact: {what}"),
                Need::Optional => {
                    warn!("skipping optional artifact: {what}");
                    report.skipped += 1;
                }
            },
        }
    }

    info!(
        placed = report.placed,
        skipped = report.skipped,
        linked = report.linked,
        "assembled distribution at {}",
        tree.root.display()
    );
    Ok(report)
}

fn apply(op: &Op) -> Result<Applied> {
    match op {
        Op::WriteFile { dest, content } => {
            ensure_parent(dest)?;
            fs::write(dest, content).with_context(|| format!("writing '{}'", dest.display()))?;
            Ok(Applied::Placed)
        }

        Op::Copy { source, dest } => {
            if !source.is_file() {
                return Ok(Applied::Missing(source.display().to_string()));
            }
            ensure_parent(dest)?;
            fs::copy(source, dest).with_context(|| {
                format!("copying '{}' to '{}'", source.display(), dest.display())
            })?;
            debug!("copied {}", source.display());
            Ok(Applied::Placed)
        }

        Op::CopyJars {
            source_dir,
            dest_dir,
        } => {
            let jars = list_jars(source_dir)?;
            if jars.is_empty() {
                return Ok(Applied::Missing(format!("{}/*.jar", source_dir.display())));
            }
            fs::create_dir_all(dest_dir)
                .with_context(|| format!("creating '{}'", dest_dir.display()))?;
            for jar in &jars {
                copy_into(jar, dest_dir)?;
            }
            debug!("copied {} jar(s) from {}", jars.len(), source_dir.display());
            Ok(Applied::Placed)
        }

        Op::CopyTree { source, dest } => {
            if !source.is_dir() {
                return Ok(Applied::Missing(source.display().to_string()));
            }
            copy_dir_recursive(source, dest)?;
            Ok(Applied::Placed)
        }

        Op::CopyDirContents { source, dest_dir } => {
            if !source.is_dir() {
                return Ok(Applied::Missing(source.display().to_string()));
            }
            copy_dir_recursive(source, dest_dir)?;
            Ok(Applied::Placed)
        }

        Op::CopyMatching {
            search_dir,
            prefix,
            dest_dir,
        } => {
            let bundles = find_bundles(search_dir, prefix);
            if bundles.is_empty() {
                return Ok(Applied::Missing(format!(
                    "runtime bundle '{}*' under {} (not downloaded yet?)",
                    prefix,
                    search_dir.display()
                )));
            }
            for bundle in bundles {
                let Some(name) = bundle.file_name() else {
                    continue;
                };
                let dest = dest_dir.join(name);
                info!("bundling {}", bundle.display());
                copy_dir_recursive(&bundle, &dest)?;
            }
            Ok(Applied::Placed)
        }

        Op::Link {
            reference,
            dependent,
        } => Ok(Applied::Linked(dedup::link_duplicates(reference, dependent)?)),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating '{}'", parent.display()))?;
    }
    Ok(())
}

/// Jars directly inside `dir`, sorted. A missing directory yields none.
fn list_jars(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut jars = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading '{}'", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "jar") {
            jars.push(path);
        }
    }
    jars.sort();
    Ok(jars)
}

/// Directories directly under `search_dir` whose names start with `prefix`, sorted.
pub fn find_bundles(search_dir: &Path, prefix: &str) -> Vec<PathBuf> {
    if !search_dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(search_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Placement;
    use tempfile::TempDir;

    fn tree(root: &Path, placements: Vec<Placement>) -> DistributionTree {
        DistributionTree {
            root: root.to_path_buf(),
            dirs: vec![PathBuf::from("jars"), PathBuf::from("externals/engines/spark")],
            placements,
        }
    }

    #[test]
    fn test_assemble_creates_skeleton() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("dist");

        let report = assemble(&tree(&root, vec![])).unwrap();

        assert_eq!(report, LayoutReport::default());
        assert!(root.join("jars").is_dir());
        assert!(root.join("externals/engines/spark").is_dir());
    }

    #[test]
    fn test_assemble_destroys_previous_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("dist");
        fs::create_dir_all(root.join("jars")).unwrap();
        fs::write(root.join("jars/stale-1.0.jar"), "old").unwrap();
        fs::create_dir_all(root.join("extension")).unwrap();

        assemble(&tree(&root, vec![])).unwrap();

        assert!(!root.join("jars/stale-1.0.jar").exists());
        assert!(!root.join("extension").exists());
    }

    #[test]
    fn test_missing_required_artifact_is_fatal() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("dist");
        let placements = vec![Placement::required(Op::Copy {
            source: temp.path().join("kyuubi-server.jar"),
            dest: root.join("jars/kyuubi-server.jar"),
        })];

        let err = assemble(&tree(&root, placements)).unwrap_err();
        assert!(err.to_string().contains("missing required artifact"));
    }

    #[test]
    fn test_missing_optional_artifact_is_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("dist");
        let placements = vec![
            Placement::optional(Op::CopyMatching {
                search_dir: temp.path().join("download"),
                prefix: "spark-".into(),
                dest_dir: root.join("externals"),
            }),
            Placement::optional(Op::Copy {
                source: temp.path().join("ext.jar"),
                dest: root.join("extension/ext.jar"),
            }),
        ];

        let report = assemble(&tree(&root, placements)).unwrap();
        assert_eq!(report.skipped, 2);
        assert!(!root.join("extension").exists());
    }

    #[test]
    fn test_copy_jars_ignores_other_files() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("target/jars");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.jar"), "a").unwrap();
        fs::write(src.join("notes.txt"), "n").unwrap();
        let root = temp.path().join("dist");

        assemble(&tree(
            &root,
            vec![Placement::required(Op::CopyJars {
                source_dir: src,
                dest_dir: root.join("jars"),
            })],
        ))
        .unwrap();

        assert!(root.join("jars/a.jar").is_file());
        assert!(!root.join("jars/notes.txt").exists());
    }

    #[test]
    fn test_copy_bundle_by_prefix() {
        let temp = TempDir::new().unwrap();
        let download = temp.path().join("download");
        fs::create_dir_all(download.join("spark-3.5.1-bin-hadoop3/jars")).unwrap();
        fs::write(download.join("spark-3.5.1-bin-hadoop3/jars/spark-core.jar"), "s").unwrap();
        fs::create_dir_all(download.join("flink-1.17.1")).unwrap();
        fs::write(download.join("spark-3.5.1-bin-hadoop3.tgz"), "archive").unwrap();

        assert_eq!(
            find_bundles(&download, "spark-"),
            vec![download.join("spark-3.5.1-bin-hadoop3")]
        );

        let root = temp.path().join("dist");
        assemble(&tree(
            &root,
            vec![Placement::optional(Op::CopyMatching {
                search_dir: download,
                prefix: "spark-".into(),
                dest_dir: root.join("externals"),
            })],
        ))
        .unwrap();

        assert!(root
            .join("externals/spark-3.5.1-bin-hadoop3/jars/spark-core.jar")
            .is_file());
        assert!(!root.join("externals/flink-1.17.1").exists());
    }
}
