//! The external build orchestrator (Maven).
//!
//! The pipeline only ever talks to the [`Orchestrator`] trait: it asks for
//! property values and asks for builds. It never looks inside the tool.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

use crate::preflight::BuildEnv;

/// A queryable, invokable build tool.
pub trait Orchestrator {
    /// Evaluate a project property, returning the tool's raw stdout.
    ///
    /// The output is expected to be noisy; callers filter it.
    fn query(&self, property: &str, passthrough: &[String]) -> Result<String>;

    /// Run a build with the given arguments, blocking until it exits.
    fn invoke(&self, args: &[String]) -> Result<ExitStatus>;
}

/// Maven, run from the project home with the resolved Java and Maven options.
#[derive(Debug, Clone)]
pub struct Maven {
    executable: PathBuf,
    home: PathBuf,
    java_home: PathBuf,
    maven_opts: String,
}

impl Maven {
    pub fn new(executable: PathBuf, env: &BuildEnv) -> Self {
        Self {
            executable,
            home: env.home.clone(),
            java_home: env.java_home.clone(),
            maven_opts: env.maven_opts.clone(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.current_dir(&self.home)
            .env("JAVA_HOME", &self.java_home)
            .env("MAVEN_OPTS", &self.maven_opts);
        cmd
    }
}

impl Orchestrator for Maven {
    fn query(&self, property: &str, passthrough: &[String]) -> Result<String> {
        let output = self
            .command()
            .arg("help:evaluate")
            .arg(format!("-Dexpression={property}"))
            .args(passthrough)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .with_context(|| {
                format!(
                    "running '{}' to evaluate {}",
                    self.executable.display(),
                    property
                )
            })?;

        if !output.status.success() {
            debug!(property, status = %output.status, "property query exited unsuccessfully");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn invoke(&self, args: &[String]) -> Result<ExitStatus> {
        self.command()
            .args(args)
            .status()
            .with_context(|| format!("running '{}'", self.executable.display()))
    }
}
