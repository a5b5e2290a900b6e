//! Build driver: runs Maven over the whole module graph, then once more for
//! the Spark SQL engine compiled against the other Scala binary version.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{BuildConfig, Component};
use crate::error::DistError;
use crate::metadata::BuildMetadata;
use crate::orchestrator::Orchestrator;

/// Flags that keep tests and secondary artifacts out of the distribution build.
pub const DIST_FLAGS: &[&str] = &[
    "-DskipTests",
    "-Dmaven.javadoc.skip=true",
    "-Dmaven.scaladoc.skip=true",
    "-Dmaven.source.skip",
];

/// The two Scala binary versions the engines are published for.
pub const SCALA_ABIS: (&str, &str) = ("2.12", "2.13");

/// Module rebuilt for the alternate Scala ABI.
pub const SPARK_ENGINE_MODULE: &str = "externals/kyuubi-spark-sql-engine";

/// Spark extension variants whose jars may linger from earlier builds.
pub const LEGACY_SPARK_EXTENSIONS: &[&str] = &["3-1", "3-2", "3-3", "3-4", "3-5"];

/// Maven profile flags derived from the configuration.
pub fn profile_flags(config: &BuildConfig) -> Vec<String> {
    let mut flags: Vec<String> = DIST_FLAGS.iter().map(|f| f.to_string()).collect();
    if config.enable_web_ui {
        flags.push("-Pweb-ui".to_string());
    }
    for component in Component::ALL {
        if config.is_provided(component) {
            flags.push(component.provided_profile());
        }
    }
    flags
}

/// The Scala binary version that is not `primary`.
pub fn alternate_scala(primary: &str) -> Result<&'static str> {
    let (a, b) = SCALA_ABIS;
    match primary {
        v if v == a => Ok(b),
        v if v == b => Ok(a),
        other => bail!(
            "cannot derive the alternate Scala binary version from '{}'; expected {} or {}",
            other,
            a,
            b
        ),
    }
}

/// Swap every occurrence of `a` with `b` and vice versa, in one left-to-right pass.
///
/// With equal-length identifiers that differ only in their last character
/// (as Scala binary versions do) applying the swap twice restores the input.
pub fn swap_abi(args: &[String], a: &str, b: &str) -> Vec<String> {
    args.iter().map(|arg| swap_in(arg, a, b)).collect()
}

fn swap_in(arg: &str, a: &str, b: &str) -> String {
    if a.is_empty() || b.is_empty() {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(ch) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix(a) {
            out.push_str(b);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(b) {
            out.push_str(a);
            rest = tail;
        } else {
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    out
}

/// Arguments of the full build.
pub fn primary_args(config: &BuildConfig) -> Vec<String> {
    let mut args = vec!["clean".to_string(), "install".to_string()];
    args.extend(profile_flags(config));
    args.extend(config.passthrough.iter().cloned());
    args
}

/// Arguments of the alternate-ABI Spark engine build.
pub fn alternate_args(config: &BuildConfig, primary_scala: &str) -> Result<Vec<String>> {
    let alt = alternate_scala(primary_scala)?;
    let (a, b) = SCALA_ABIS;

    let mut args = vec!["install".to_string()];
    args.extend(profile_flags(config));
    args.extend([
        "-pl".to_string(),
        SPARK_ENGINE_MODULE.to_string(),
        "-am".to_string(),
        format!("-Pscala-{alt}"),
    ]);
    args.extend(swap_abi(&config.passthrough, a, b));
    Ok(args)
}

/// Remove jars left behind by Spark extension builds of earlier runs.
pub fn clean_stale_artifacts(home: &Path) -> Result<usize> {
    let mut removed = 0usize;
    for variant in LEGACY_SPARK_EXTENSIONS {
        let target = home
            .join("extensions/spark")
            .join(format!("kyuubi-extension-spark-{variant}"))
            .join("target");
        if !target.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&target)
            .with_context(|| format!("reading stale artifact directory '{}'", target.display()))?
        {
            let path = entry
                .with_context(|| format!("reading entry under '{}'", target.display()))?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "jar") {
                fs::remove_file(&path)
                    .with_context(|| format!("removing stale artifact '{}'", path.display()))?;
                debug!("removed stale artifact {}", path.display());
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Run both builds. Either failing aborts the pipeline; artifacts already
/// written by the first build stay where they are.
///
/// Both argument lists are derived before anything touches the project, so
/// an unusable Scala version aborts without invoking Maven at all.
pub fn run(
    orchestrator: &dyn Orchestrator,
    home: &Path,
    config: &BuildConfig,
    metadata: &BuildMetadata,
) -> Result<()> {
    let primary = primary_args(config);
    let alternate = alternate_args(config, &metadata.scala_version)?;

    let removed = clean_stale_artifacts(home)?;
    if removed > 0 {
        info!("removed {removed} stale extension jar(s)");
    }

    info!("Building with...\n$ mvn {}", primary.join(" "));
    invoke_checked(orchestrator, "primary build", &primary)?;

    info!(
        "Building {} for the alternate Scala ABI...\n$ mvn {}",
        SPARK_ENGINE_MODULE,
        alternate.join(" ")
    );
    invoke_checked(orchestrator, "alternate Scala build", &alternate)?;

    Ok(())
}

fn invoke_checked(orchestrator: &dyn Orchestrator, step: &str, args: &[String]) -> Result<()> {
    let status = orchestrator
        .invoke(args)
        .with_context(|| format!("starting {step}"))?;
    if !status.success() {
        return Err(DistError::BuildFailed {
            step: step.to_string(),
            code: status.code().unwrap_or(1),
        }
        .into());
    }
    Ok(())
}
