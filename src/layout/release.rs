//! The `RELEASE` file written at the distribution root.

use crate::metadata::BuildMetadata;

/// Render the RELEASE text: product version, git revision when known, the
/// runtime and dependency versions, and the exact Maven flags used.
pub fn render(metadata: &BuildMetadata, git_revision: Option<&str>, flags: &[String]) -> String {
    let revision = git_revision
        .map(|rev| format!(" (git revision {rev})"))
        .unwrap_or_default();

    let mut out = format!("Kyuubi {}{} built for\n", metadata.version, revision);
    out.push_str(&format!("Java {}\n", metadata.java_version));
    out.push_str(&format!("Scala {}\n", metadata.scala_version));
    out.push_str(&format!("Flink {}\n", metadata.component_version("Flink")));
    out.push_str(&format!("Spark {}\n", metadata.component_version("Spark")));
    out.push_str(&format!(
        "Kyuubi Hadoop {}\n",
        metadata.component_version("Hadoop")
    ));
    out.push_str(&format!("Hive {}\n", metadata.component_version("Hive")));
    out.push_str(&format!("Build flags: {}\n", flags.join(" ")));
    out
}
