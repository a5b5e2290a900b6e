//! Binary distribution assembly for Kyuubi.
//!
//! Turns a Maven multi-module build into a self-contained distribution tree
//! and, on request, a reproducible `.tgz`.
//!
//! - **Config** - command line into an immutable [`BuildConfig`]
//! - **Preflight** - project home, Java home, Maven options, orchestrator lookup
//! - **Metadata** - version strings queried from Maven
//! - **Driver** - the primary build and the alternate Scala ABI build
//! - **Layout** - declarative placement plan plus the executor that applies it
//! - **Dedup** - jars shared with `jars/` become relative symlinks
//! - **Archive** - staging and deterministic tar.gz
//!
//! # Architecture
//!
//! ```text
//! kyuubi-dist (binary)
//!     │
//!     └── pipeline::execute
//!             ├── preflight::BuildEnv::resolve
//!             ├── metadata::resolve ──────┐
//!             ├── driver::run ────────────┤ Orchestrator (Maven)
//!             ├── layout::plan ─▶ layout::executor::assemble ─▶ dedup
//!             └── archive::package
//! ```

pub mod archive;
pub mod config;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod filesystem;
pub mod layout;
pub mod metadata;
pub mod orchestrator;
pub mod pipeline;
pub mod preflight;

pub use config::{BuildConfig, Component};
pub use error::DistError;
pub use metadata::BuildMetadata;
pub use orchestrator::{Maven, Orchestrator};
