//! Archive packager: stage the distribution under its release name and
//! compress it into a reproducible `.tgz`.
//!
//! Tar headers are normalized (zero mtime, uid and gid, no owner names, no
//! extended attributes) and entries are sorted, so the same tree always
//! produces the same bytes on any platform.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{BuildConfig, Component};
use crate::filesystem::{copy_dir_recursive, remove_path};
use crate::metadata::BuildMetadata;

/// Names of the staging directory and the archive derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpec {
    pub staging_dir_name: String,
    pub output_file_name: String,
}

impl ArchiveSpec {
    pub fn derive(metadata: &BuildMetadata, config: &BuildConfig) -> Self {
        let suffix = name_suffix(config, metadata.spark_version());
        let staging_dir_name = format!("apache-kyuubi-{}-bin{}", metadata.version, suffix);
        let output_file_name = format!("{staging_dir_name}.tgz");
        Self {
            staging_dir_name,
            output_file_name,
        }
    }
}

/// `-<name>` for a custom name, nothing when Spark is provided, otherwise
/// `-spark-` and the leading three characters of the Spark version.
pub fn name_suffix(config: &BuildConfig, spark_version: &str) -> String {
    if let Some(name) = &config.custom_name {
        return format!("-{name}");
    }
    if config.is_provided(Component::Spark) {
        return String::new();
    }
    let short: String = spark_version.chars().take(3).collect();
    format!("-spark-{short}")
}

/// Copy `dist` to `<out_dir>/<staging>`, compress it to `<out_dir>/<archive>`,
/// and remove the staging copy whether or not compression succeeded.
pub fn package(spec: &ArchiveSpec, dist: &Path, out_dir: &Path) -> Result<PathBuf> {
    let staging = out_dir.join(&spec.staging_dir_name);
    let output = out_dir.join(&spec.output_file_name);

    let result = remove_path(&staging)
        .and_then(|_| copy_dir_recursive(dist, &staging))
        .with_context(|| format!("staging distribution at '{}'", staging.display()))
        .and_then(|_| write_tar_gz(&staging, &spec.staging_dir_name, &output));

    let cleanup = remove_path(&staging);
    match (result, cleanup) {
        (Ok(()), Ok(())) => {}
        (Ok(()), Err(err)) => return Err(err.context("removing staging directory")),
        (Err(err), cleanup) => {
            if let Err(cleanup_err) = cleanup {
                warn!("failed to remove staging directory: {cleanup_err:#}");
            }
            return Err(err);
        }
    }

    let digest = sha256_file(&output)?;
    info!(
        sha256 = %digest,
        "The Kyuubi tarball {} is successfully generated in {}.",
        spec.output_file_name,
        out_dir.display()
    );
    Ok(output)
}

/// Write `src_dir` as a gzip-compressed tar whose entries live under `root_name/`.
pub fn write_tar_gz(src_dir: &Path, root_name: &str, out_path: &Path) -> Result<()> {
    let tmp_path = out_path.with_extension("tgz.tmp");
    let written = write_tar_gz_to(src_dir, root_name, &tmp_path)
        .and_then(|_| {
            fs::rename(&tmp_path, out_path).with_context(|| {
                format!(
                    "moving '{}' to '{}'",
                    tmp_path.display(),
                    out_path.display()
                )
            })
        });
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

fn write_tar_gz_to(src_dir: &Path, root_name: &str, out_path: &Path) -> Result<()> {
    let out = File::create(out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    let encoder = GzEncoder::new(out, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    // Collect paths deterministically.
    let mut entries: Vec<PathBuf> = vec![];
    for ent in WalkDir::new(src_dir).follow_links(false) {
        let ent = ent.with_context(|| format!("walking '{}'", src_dir.display()))?;
        entries.push(ent.into_path());
    }
    entries.sort_by(|a, b| {
        let ra = a.strip_prefix(src_dir).unwrap_or(a).to_string_lossy();
        let rb = b.strip_prefix(src_dir).unwrap_or(b).to_string_lossy();
        ra.cmp(&rb)
    });

    for p in entries {
        let rel = p.strip_prefix(src_dir).unwrap_or(&p);
        let name = if rel.as_os_str().is_empty() {
            PathBuf::from(root_name)
        } else {
            Path::new(root_name).join(rel)
        };

        let md = fs::symlink_metadata(&p)?;
        let mut header = normalized_header(&md);

        if md.is_dir() {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            builder.append_data(&mut header, &name, std::io::empty())?;
        } else if md.file_type().is_symlink() {
            let target = fs::read_link(&p)?;
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            builder.append_link(&mut header, &name, &target)?;
        } else if md.is_file() {
            let mut f = File::open(&p)?;
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(md.len());
            builder.append_data(&mut header, &name, &mut f)?;
        }
    }

    let encoder = builder
        .into_inner()
        .with_context(|| "Failed to finalize tar builder")?;
    encoder.finish()?;
    Ok(())
}

fn normalized_header(md: &fs::Metadata) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        header.set_mode(md.permissions().mode() & 0o7777);
    }
    #[cfg(not(unix))]
    {
        header.set_mode(if md.is_dir() { 0o755 } else { 0o644 });
    }
    header
}

fn sha256_file(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
