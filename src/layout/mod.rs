//! Distribution layout.
//!
//! Layout is split in two halves:
//! - [`plan`] decides WHAT goes where. It is a pure function of the project
//!   home, the configuration and the resolved metadata, and returns a
//!   [`DistributionTree`].
//! - [`executor`] decides HOW: it destroys the previous tree, creates the
//!   skeleton and carries out each [`Op`] in order.
//!
//! # Output
//!
//! ```text
//! dist/
//!     ├── RELEASE
//!     ├── pid/ logs/ work/
//!     ├── jars/                 server jars (dedup reference)
//!     ├── db-scripts/
//!     ├── beeline-jars/         linked against jars/
//!     ├── web-ui/
//!     ├── extension/            only when extension jars exist
//!     ├── externals/
//!     │   ├── engines/{flink,spark,trino,hive,jdbc,chat}/
//!     │   └── <runtime bundles>  unless provided
//!     └── bin/ conf/ docker/ charts/ LICENSE NOTICE licenses/
//! ```

pub mod executor;
pub mod release;

use std::path::{Path, PathBuf};

use crate::config::{BuildConfig, Component};
use crate::driver;
use crate::metadata::BuildMetadata;

/// Skeleton directories, relative to the distribution root.
pub const SKELETON: &[&str] = &[
    "pid",
    "logs",
    "work",
    "jars",
    "db-scripts",
    "beeline-jars",
    "web-ui",
    "externals/engines/flink",
    "externals/engines/spark",
    "externals/engines/trino",
    "externals/engines/hive",
    "externals/engines/jdbc",
    "externals/engines/chat",
];

/// Directory under the project home where runtime bundles are downloaded.
pub const DOWNLOAD_CACHE: &str = "externals/kyuubi-download/target";

/// An engine shipped under `externals/engines/<dir>`.
struct Engine {
    dir: &'static str,
    module: &'static str,
    /// Whether `target/scala-<abi>/jars/` ships alongside the engine jar.
    with_dependencies: bool,
}

const ENGINES: &[Engine] = &[
    Engine {
        dir: "flink",
        module: "kyuubi-flink-sql-engine",
        with_dependencies: false,
    },
    Engine {
        dir: "spark",
        module: "kyuubi-spark-sql-engine",
        with_dependencies: false,
    },
    Engine {
        dir: "trino",
        module: "kyuubi-trino-engine",
        with_dependencies: true,
    },
    Engine {
        dir: "hive",
        module: "kyuubi-hive-sql-engine",
        with_dependencies: true,
    },
    Engine {
        dir: "jdbc",
        module: "kyuubi-jdbc-engine",
        with_dependencies: false,
    },
    Engine {
        dir: "chat",
        module: "kyuubi-chat-engine",
        with_dependencies: true,
    },
];

/// Runtime bundle directory name prefix inside [`DOWNLOAD_CACHE`].
fn bundle_prefix(component: Component) -> &'static str {
    match component {
        Component::Flink => "flink-",
        Component::Spark => "spark-",
        Component::Hive => "apache-hive-",
    }
}

/// Whether a missing source aborts the run or is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    Required,
    Optional,
}

/// One placement step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Write a file with the given content.
    WriteFile { dest: PathBuf, content: String },

    /// Copy a single file to an exact destination path.
    Copy { source: PathBuf, dest: PathBuf },

    /// Copy every `*.jar` directly inside `source_dir` into `dest_dir`.
    CopyJars { source_dir: PathBuf, dest_dir: PathBuf },

    /// Copy a directory tree to an exact destination path.
    CopyTree { source: PathBuf, dest: PathBuf },

    /// Copy the contents of a directory into `dest_dir`.
    CopyDirContents { source: PathBuf, dest_dir: PathBuf },

    /// Copy every directory in `search_dir` whose name starts with `prefix`
    /// into `dest_dir`, keeping its name.
    CopyMatching {
        search_dir: PathBuf,
        prefix: String,
        dest_dir: PathBuf,
    },

    /// Replace files in `dependent` that also exist in `reference` with links.
    Link { reference: PathBuf, dependent: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub op: Op,
    pub need: Need,
}

impl Placement {
    pub fn required(op: Op) -> Self {
        Self {
            op,
            need: Need::Required,
        }
    }

    pub fn optional(op: Op) -> Self {
        Self {
            op,
            need: Need::Optional,
        }
    }
}

/// Everything the layout executor will do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionTree {
    pub root: PathBuf,
    pub dirs: Vec<PathBuf>,
    pub placements: Vec<Placement>,
}

impl DistributionTree {
    pub fn ops(&self) -> impl Iterator<Item = &Op> {
        self.placements.iter().map(|p| &p.op)
    }
}

/// Inputs that shape the layout beyond the configuration.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInputs<'a> {
    pub home: &'a Path,
    pub root: &'a Path,
    pub config: &'a BuildConfig,
    pub metadata: &'a BuildMetadata,
    pub git_revision: Option<&'a str>,
}

/// Decide the full distribution layout.
pub fn plan(inputs: LayoutInputs<'_>) -> DistributionTree {
    let LayoutInputs {
        home,
        root,
        config,
        metadata,
        git_revision,
    } = inputs;
    let abi = metadata.scala_version.as_str();
    let version = metadata.version.as_str();
    let jars = root.join("jars");

    let mut placements = vec![Placement::required(Op::WriteFile {
        dest: root.join("RELEASE"),
        content: release::render(metadata, git_revision, &config.passthrough),
    })];

    if config.enable_web_ui {
        placements.push(Placement::optional(Op::CopyDirContents {
            source: home.join("kyuubi-server/web-ui/dist"),
            dest_dir: root.join("web-ui"),
        }));
    }

    placements.push(Placement::required(Op::CopyJars {
        source_dir: home.join(format!("kyuubi-server/target/scala-{abi}/jars")),
        dest_dir: jars.clone(),
    }));

    placements.push(Placement::required(Op::CopyDirContents {
        source: home.join("kyuubi-server/src/main/resources/sql"),
        dest_dir: root.join("db-scripts"),
    }));

    let beeline = root.join("beeline-jars");
    let beeline_jar = format!("kyuubi-hive-beeline-{version}.jar");
    placements.extend([
        Placement::required(Op::Copy {
            source: home.join("kyuubi-hive-beeline/target").join(&beeline_jar),
            dest: beeline.join(&beeline_jar),
        }),
        Placement::required(Op::CopyJars {
            source_dir: home.join("kyuubi-hive-beeline/target/jars"),
            dest_dir: beeline.clone(),
        }),
        Placement::required(Op::Link {
            reference: jars.clone(),
            dependent: beeline,
        }),
    ]);

    for engine in ENGINES {
        placements.extend(engine_placements(engine, home, root, metadata));
    }

    placements.extend(extension_placements(home, root, metadata));

    for component in Component::ALL {
        if config.is_provided(component) {
            continue;
        }
        placements.push(Placement::optional(Op::CopyMatching {
            search_dir: home.join(DOWNLOAD_CACHE),
            prefix: bundle_prefix(component).to_string(),
            dest_dir: root.join("externals"),
        }));
    }

    placements.extend(auxiliary_placements(home, root));

    DistributionTree {
        root: root.to_path_buf(),
        dirs: SKELETON.iter().map(PathBuf::from).collect(),
        placements,
    }
}

fn engine_jar_name(module: &str, abi: &str, version: &str) -> String {
    format!("{module}_{abi}-{version}.jar")
}

fn engine_placements(
    engine: &Engine,
    home: &Path,
    root: &Path,
    metadata: &BuildMetadata,
) -> Vec<Placement> {
    let abi = metadata.scala_version.as_str();
    let version = metadata.version.as_str();
    let target = home.join("externals").join(engine.module).join("target");
    let dest_dir = root.join("externals/engines").join(engine.dir);

    let mut abis = vec![abi];
    if engine.module == "kyuubi-spark-sql-engine" {
        if let Ok(alt) = driver::alternate_scala(abi) {
            abis.push(alt);
        }
    }

    let mut placements: Vec<Placement> = abis
        .into_iter()
        .map(|abi| {
            let name = engine_jar_name(engine.module, abi, version);
            Placement::required(Op::Copy {
                source: target.join(&name),
                dest: dest_dir.join(&name),
            })
        })
        .collect();

    if engine.with_dependencies {
        placements.push(Placement::required(Op::CopyJars {
            source_dir: target.join(format!("scala-{abi}/jars")),
            dest_dir: dest_dir.clone(),
        }));
    }

    placements.push(Placement::required(Op::Link {
        reference: root.join("jars"),
        dependent: dest_dir,
    }));
    placements
}

/// `3.5.1` -> `3-5`, the suffix of the matching Spark extension module.
pub fn spark_extension_variant(spark_version: &str) -> Option<String> {
    let mut parts = spark_version.split('.');
    let major = parts.next().filter(|p| !p.is_empty())?;
    let minor = parts.next().filter(|p| !p.is_empty())?;
    if !major.chars().chain(minor.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{major}-{minor}"))
}

fn extension_placements(home: &Path, root: &Path, metadata: &BuildMetadata) -> Vec<Placement> {
    let Some(variant) = spark_extension_variant(metadata.spark_version()) else {
        return Vec::new();
    };
    let module = format!("kyuubi-extension-spark-{variant}");
    let name = engine_jar_name(&module, &metadata.scala_version, &metadata.version);
    vec![Placement::optional(Op::Copy {
        source: home
            .join("extensions/spark")
            .join(&module)
            .join("target")
            .join(&name),
        dest: root.join("extension").join(&name),
    })]
}

fn auxiliary_placements(home: &Path, root: &Path) -> Vec<Placement> {
    let mut placements = vec![
        Placement::optional(Op::Copy {
            source: home.join("LICENSE-binary"),
            dest: root.join("LICENSE"),
        }),
        Placement::optional(Op::Copy {
            source: home.join("NOTICE-binary"),
            dest: root.join("NOTICE"),
        }),
        Placement::optional(Op::CopyTree {
            source: home.join("licenses-binary"),
            dest: root.join("licenses"),
        }),
    ];
    for dir in ["bin", "conf", "docker", "charts"] {
        placements.push(Placement::optional(Op::CopyTree {
            source: home.join(dir),
            dest: root.join(dir),
        }));
    }
    placements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> BuildMetadata {
        let mut metadata = BuildMetadata {
            version: "1.9.0".into(),
            java_version: "1.8".into(),
            scala_version: "2.12".into(),
            ..Default::default()
        };
        metadata
            .component_versions
            .insert("Spark".into(), "3.5.1".into());
        metadata
    }

    fn plan_for(config: &BuildConfig) -> DistributionTree {
        let metadata = metadata();
        plan(LayoutInputs {
            home: Path::new("/src/kyuubi"),
            root: Path::new("/src/kyuubi/dist"),
            config,
            metadata: &metadata,
            git_revision: None,
        })
    }

    fn bundle_prefixes(tree: &DistributionTree) -> Vec<String> {
        tree.ops()
            .filter_map(|op| match op {
                Op::CopyMatching { prefix, .. } => Some(prefix.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_skeleton_directories() {
        let tree = plan_for(&BuildConfig::default());
        assert_eq!(tree.root, PathBuf::from("/src/kyuubi/dist"));
        assert!(tree.dirs.contains(&PathBuf::from("externals/engines/chat")));
        assert!(tree.dirs.contains(&PathBuf::from("pid")));
        assert_eq!(tree.dirs.len(), SKELETON.len());
    }

    #[test]
    fn test_release_is_written_first() {
        let tree = plan_for(&BuildConfig::default());
        match &tree.placements[0].op {
            Op::WriteFile { dest, content } => {
                assert_eq!(dest, &PathBuf::from("/src/kyuubi/dist/RELEASE"));
                assert!(content.starts_with("Kyuubi 1.9.0 built for"));
            }
            other => panic!("unexpected first op {other:?}"),
        }
    }

    #[test]
    fn test_engine_jars_embed_abi_and_version() {
        let tree = plan_for(&BuildConfig::default());
        let expected = Op::Copy {
            source: PathBuf::from(
                "/src/kyuubi/externals/kyuubi-trino-engine/target/\
                 kyuubi-trino-engine_2.12-1.9.0.jar",
            ),
            dest: PathBuf::from(
                "/src/kyuubi/dist/externals/engines/trino/kyuubi-trino-engine_2.12-1.9.0.jar",
            ),
        };
        assert!(tree.ops().any(|op| op == &expected));
    }

    #[test]
    fn test_spark_engine_ships_both_abis() {
        let tree = plan_for(&BuildConfig::default());
        let spark_dir = Path::new("/src/kyuubi/dist/externals/engines/spark");
        let spark_jars: Vec<_> = tree
            .ops()
            .filter_map(|op| match op {
                Op::Copy { dest, .. } if dest.starts_with(spark_dir) => {
                    Some(dest.file_name().unwrap().to_string_lossy().to_string())
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            spark_jars,
            vec![
                "kyuubi-spark-sql-engine_2.12-1.9.0.jar",
                "kyuubi-spark-sql-engine_2.13-1.9.0.jar"
            ]
        );
    }

    #[test]
    fn test_dedup_follows_each_shared_directory() {
        let tree = plan_for(&BuildConfig::default());
        let ops: Vec<&Op> = tree.ops().collect();
        let beeline = PathBuf::from("/src/kyuubi/dist/beeline-jars");

        let last_beeline_copy = ops
            .iter()
            .rposition(|op| matches!(op, Op::CopyJars { dest_dir, .. } if *dest_dir == beeline))
            .unwrap();
        assert!(matches!(
            ops[last_beeline_copy + 1],
            Op::Link { dependent, reference }
                if *dependent == beeline && *reference == PathBuf::from("/src/kyuubi/dist/jars")
        ));

        let linked = ops
            .iter()
            .filter(|op| matches!(op, Op::Link { .. }))
            .count();
        assert_eq!(linked, 1 + ENGINES.len());
    }

    #[test]
    fn test_provided_components_skip_bundles() {
        let mut config = BuildConfig::default();
        assert_eq!(
            bundle_prefixes(&plan_for(&config)),
            vec!["flink-", "spark-", "apache-hive-"]
        );

        config.provided.insert(Component::Spark);
        assert_eq!(
            bundle_prefixes(&plan_for(&config)),
            vec!["flink-", "apache-hive-"]
        );
    }

    #[test]
    fn test_bundles_are_optional() {
        let tree = plan_for(&BuildConfig::default());
        assert!(tree
            .placements
            .iter()
            .filter(|p| matches!(p.op, Op::CopyMatching { .. }))
            .all(|p| p.need == Need::Optional));
    }

    #[test]
    fn test_web_ui_only_when_enabled() {
        let has_web_ui = |tree: &DistributionTree| {
            tree.ops().any(|op| {
                matches!(op, Op::CopyDirContents { dest_dir, .. } if dest_dir.ends_with("web-ui"))
            })
        };
        assert!(!has_web_ui(&plan_for(&BuildConfig::default())));
        assert!(has_web_ui(&plan_for(&BuildConfig {
            enable_web_ui: true,
            ..Default::default()
        })));
    }

    #[test]
    fn test_extension_for_resolved_spark_version() {
        let tree = plan_for(&BuildConfig::default());
        let expected = PathBuf::from(
            "/src/kyuubi/dist/extension/kyuubi-extension-spark-3-5_2.12-1.9.0.jar",
        );
        assert!(tree
            .placements
            .iter()
            .any(|p| p.need == Need::Optional
                && matches!(&p.op, Op::Copy { dest, .. } if *dest == expected)));
    }

    #[test]
    fn test_spark_extension_variant() {
        assert_eq!(spark_extension_variant("3.5.1").as_deref(), Some("3-5"));
        assert_eq!(spark_extension_variant("3.4"), Some("3-4".to_string()));
        assert_eq!(spark_extension_variant(""), None);
        assert_eq!(spark_extension_variant("3"), None);
        assert_eq!(spark_extension_variant("x.y.z"), None);
    }
}
