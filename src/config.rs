//! Command-line resolution into an immutable [`BuildConfig`].
//!
//! Flag parsing stops at the first single-dash token; that token and
//! everything after it is handed to Maven untouched.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::DistError;

/// Orchestrator location relative to the project home when `--mvn` is absent.
pub const DEFAULT_ORCHESTRATOR: &str = "build/mvn";

/// Components whose runtime can be marked as provided by the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    Flink,
    Spark,
    Hive,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Flink, Component::Spark, Component::Hive];

    /// Lowercase identifier used in flags and Maven profiles.
    pub fn id(self) -> &'static str {
        match self {
            Component::Flink => "flink",
            Component::Spark => "spark",
            Component::Hive => "hive",
        }
    }

    /// Maven profile enabled when this component is provided.
    pub fn provided_profile(self) -> String {
        format!("-P{}-provided", self.id())
    }

    fn from_provided_flag(flag: &str) -> Option<Component> {
        Component::ALL
            .into_iter()
            .find(|c| flag == format!("--{}-provided", c.id()))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Flink => write!(f, "Flink"),
            Component::Spark => write!(f, "Spark"),
            Component::Hive => write!(f, "Hive"),
        }
    }
}

/// Resolved command line. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildConfig {
    pub custom_name: Option<String>,
    pub make_archive: bool,
    pub enable_web_ui: bool,
    pub provided: BTreeSet<Component>,
    /// `--mvn` override; `None` means [`DEFAULT_ORCHESTRATOR`] under the home.
    pub orchestrator: Option<PathBuf>,
    pub passthrough: Vec<String>,
}

impl BuildConfig {
    pub fn is_provided(&self, component: Component) -> bool {
        self.provided.contains(&component)
    }

    pub fn orchestrator_path(&self, home: &Path) -> PathBuf {
        self.orchestrator
            .clone()
            .unwrap_or_else(|| home.join(DEFAULT_ORCHESTRATOR))
    }
}

pub fn usage() -> &'static str {
    "kyuubi-dist - Tool for making binary distributions of Kyuubi\n\
     \n\
     Usage:\n\
     \x20 kyuubi-dist [--name <custom_name>] [--tgz] [--web-ui] [--flink-provided]\n\
     \x20             [--spark-provided] [--hive-provided] [--mvn <maven_executable>]\n\
     \x20             <maven build options>\n\
     \n\
     See Kyuubi's \"Building a Runnable Distribution\" doc for more information."
}

/// Parse command-line tokens (program name excluded).
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<BuildConfig> {
    let mut config = BuildConfig::default();
    let mut idx = 0;

    while idx < args.len() {
        let arg = args[idx].as_ref();
        match arg {
            "--tgz" => config.make_archive = true,
            "--web-ui" => config.enable_web_ui = true,
            "--mvn" => {
                let value = flag_value(args, idx, arg)?;
                config.orchestrator = Some(PathBuf::from(value));
                idx += 1;
            }
            "--name" => {
                let value = flag_value(args, idx, arg)?;
                config.custom_name = match value {
                    "" | "none" => None,
                    name => Some(name.to_string()),
                };
                idx += 1;
            }
            "--help" => return Err(DistError::Help.into()),
            flag if flag.starts_with("--") => match Component::from_provided_flag(flag) {
                Some(component) => {
                    config.provided.insert(component);
                }
                None => {
                    return Err(DistError::Usage(format!("Error: {flag} is not supported")).into())
                }
            },
            flag if flag.starts_with('-') => {
                config.passthrough = args[idx..]
                    .iter()
                    .map(|a| a.as_ref().to_string())
                    .collect();
                break;
            }
            other => {
                return Err(DistError::Usage(format!("Error: {other} is not supported")).into())
            }
        }
        idx += 1;
    }

    Ok(config)
}

fn flag_value<'a, S: AsRef<str>>(args: &'a [S], idx: usize, flag: &str) -> Result<&'a str> {
    match args.get(idx + 1) {
        Some(value) => Ok(value.as_ref()),
        None => Err(DistError::Usage(format!("Error: {flag} requires a value")).into()),
    }
}
