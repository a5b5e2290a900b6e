//! Build metadata resolved by querying the orchestrator.
//!
//! Each property is queried on its own. A query that produces nothing usable
//! leaves an empty value behind instead of failing the run; the value only
//! feeds names and the RELEASE file.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::orchestrator::Orchestrator;

pub const VERSION_PROPERTY: &str = "project.version";
pub const JAVA_VERSION_PROPERTY: &str = "java.version";
pub const SCALA_VERSION_PROPERTY: &str = "scala.binary.version";

/// Dependency versions recorded in the RELEASE file, keyed by display name.
pub const COMPONENT_PROPERTIES: &[(&str, &str)] = &[
    ("Flink", "flink.version"),
    ("Spark", "spark.version"),
    ("Hive", "hive.version"),
    ("Hadoop", "hadoop.version"),
];

/// Markers of Maven's informational chatter.
const NOISE_MARKERS: &[&str] = &["INFO", "WARNING"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildMetadata {
    pub version: String,
    pub java_version: String,
    /// Scala binary version the primary build targets, e.g. `2.12`.
    pub scala_version: String,
    pub component_versions: BTreeMap<String, String>,
}

impl BuildMetadata {
    /// Version of a dependency component, empty when unresolved.
    pub fn component_version(&self, name: &str) -> &str {
        self.component_versions
            .get(name)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn spark_version(&self) -> &str {
        self.component_version("Spark")
    }
}

/// Query every property. Identical inputs yield identical metadata.
pub fn resolve(orchestrator: &dyn Orchestrator, passthrough: &[String]) -> BuildMetadata {
    let query = |property: &str| resolve_property(orchestrator, property, passthrough);

    let metadata = BuildMetadata {
        version: query(VERSION_PROPERTY),
        java_version: query(JAVA_VERSION_PROPERTY),
        scala_version: query(SCALA_VERSION_PROPERTY),
        component_versions: COMPONENT_PROPERTIES
            .iter()
            .map(|(name, property)| (name.to_string(), query(property)))
            .collect(),
    };

    info!(
        version = %metadata.version,
        java = %metadata.java_version,
        scala = %metadata.scala_version,
        "resolved build metadata"
    );
    metadata
}

fn resolve_property(
    orchestrator: &dyn Orchestrator,
    property: &str,
    passthrough: &[String],
) -> String {
    let raw = match orchestrator.query(property, passthrough) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("querying {property} failed: {err:#}");
            return String::new();
        }
    };

    let value = last_meaningful_line(&raw);
    if value.is_empty() {
        warn!("{property} resolved to an empty value");
    }
    value
}

/// Drop noise and blank lines, keep the last remaining line.
pub fn last_meaningful_line(raw: &str) -> String {
    raw.lines()
        .filter(|line| !NOISE_MARKERS.iter().any(|marker| line.contains(marker)))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("")
        .to_string()
}
