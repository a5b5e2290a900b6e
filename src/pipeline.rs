//! The distribution pipeline.
//!
//! ```text
//! BuildConfig ─▶ preflight ─▶ metadata ─▶ driver ─▶ layout (+ dedup) ─▶ archive
//! ```
//!
//! Stages run strictly in order and each consumes only what the previous one
//! produced. The first failure aborts the run.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::archive::{self, ArchiveSpec};
use crate::config::BuildConfig;
use crate::driver;
use crate::layout::executor::{self, LayoutReport};
use crate::layout::{self, LayoutInputs};
use crate::metadata;
use crate::orchestrator::{Maven, Orchestrator};
use crate::preflight::{self, BuildEnv};

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub dist_dir: PathBuf,
    pub layout: LayoutReport,
    pub archive: Option<PathBuf>,
}

/// Resolve the environment, check the orchestrator and run every stage.
pub fn execute(config: &BuildConfig) -> Result<Outcome> {
    let env = BuildEnv::resolve().context("resolving build environment")?;
    let executable = preflight::require_orchestrator(&config.orchestrator_path(&env.home))?;
    let maven = Maven::new(executable, &env);
    info!("using Maven at {}", maven.executable().display());

    let git_revision = preflight::git_revision(&env.home);
    run(config, &env, &maven, git_revision.as_deref())
}

/// Run the pipeline against an already reachable orchestrator.
pub fn run(
    config: &BuildConfig,
    env: &BuildEnv,
    orchestrator: &dyn Orchestrator,
    git_revision: Option<&str>,
) -> Result<Outcome> {
    let metadata = metadata::resolve(orchestrator, &config.passthrough);

    driver::run(orchestrator, &env.home, config, &metadata).context("building modules")?;

    let dist_dir = env.dist_dir();
    let tree = layout::plan(LayoutInputs {
        home: &env.home,
        root: &dist_dir,
        config,
        metadata: &metadata,
        git_revision,
    });
    let layout = executor::assemble(&tree).context("assembling distribution")?;

    let archive = if config.make_archive {
        let spec = ArchiveSpec::derive(&metadata, config);
        let path = archive::package(&spec, &dist_dir, &env.home)
            .with_context(|| format!("packaging {}", spec.output_file_name))?;
        Some(path)
    } else {
        None
    };

    Ok(Outcome {
        dist_dir,
        layout,
        archive,
    })
}
