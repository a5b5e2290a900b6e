//! Preflight checks and environment resolution.
//!
//! Everything here runs before the first Maven query. Failures are fatal:
//! without a project home, a Java home and a reachable orchestrator there is
//! nothing to assemble.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Heap and code-cache settings used when `MAVEN_OPTS` is unset.
pub const DEFAULT_MAVEN_OPTS: &str = "-Xmx2g -XX:ReservedCodeCacheSize=1g";

/// Environment the pipeline runs in. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnv {
    /// Root of the Maven project being distributed.
    pub home: PathBuf,
    pub java_home: PathBuf,
    pub maven_opts: String,
}

impl BuildEnv {
    /// Resolve the environment from the process environment and current directory.
    pub fn resolve() -> Result<Self> {
        let home = locate_project_home()?;
        let java_home = resolve_java_home()?;
        let maven_opts = maven_opts_or_default(env::var("MAVEN_OPTS").ok());
        debug!(
            home = %home.display(),
            java_home = %java_home.display(),
            maven_opts = %maven_opts,
            "resolved build environment"
        );
        Ok(Self {
            home,
            java_home,
            maven_opts,
        })
    }

    /// Distribution directory assembled under the project home.
    pub fn dist_dir(&self) -> PathBuf {
        self.home.join("dist")
    }
}

/// Locate the project home: `KYUUBI_HOME`, else the nearest ancestor of the
/// current directory holding `pom.xml` and `externals/`.
pub fn locate_project_home() -> Result<PathBuf> {
    if let Ok(home) = env::var("KYUUBI_HOME") {
        let path = PathBuf::from(&home);
        if !path.join("pom.xml").is_file() {
            bail!("KYUUBI_HOME does not point at a Maven project: {}", home);
        }
        return Ok(path);
    }

    let cwd = env::current_dir().context("resolving current directory")?;
    locate_project_home_from(&cwd)
}

pub fn locate_project_home_from(start: &Path) -> Result<PathBuf> {
    for candidate in start.ancestors() {
        if candidate.join("pom.xml").is_file() && candidate.join("externals").is_dir() {
            return Ok(candidate.to_path_buf());
        }
    }
    bail!(
        "unable to locate the project home from '{}'; \
         run inside the source tree or set KYUUBI_HOME",
        start.display()
    )
}

/// Resolve the Java home: `JAVA_HOME`, then rpm's `%java_home` macro, then
/// the install root of a `java` found on `PATH`.
pub fn resolve_java_home() -> Result<PathBuf> {
    if let Some(home) = env::var_os("JAVA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    if which::which("rpm").is_ok() {
        let expanded = Command::new("rpm")
            .args(["-E", "%java_home"])
            .output()
            .ok()
            .and_then(|out| parse_rpm_java_home(&String::from_utf8_lossy(&out.stdout)));
        if let Some(home) = expanded {
            info!("No JAVA_HOME set, proceeding with '{}' learned from rpm", home.display());
            return Ok(home);
        }
    }

    if let Ok(java) = which::which("java") {
        if let Some(home) = java_home_from_executable(&java) {
            return Ok(home);
        }
    }

    bail!("JAVA_HOME is not set, cannot proceed")
}

/// rpm echoes the macro back verbatim when it is undefined.
fn parse_rpm_java_home(output: &str) -> Option<PathBuf> {
    let value = output.trim();
    if value.is_empty() || value == "%java_home" {
        return None;
    }
    Some(PathBuf::from(value))
}

/// `/usr/bin/java` -> `/usr`.
fn java_home_from_executable(java: &Path) -> Option<PathBuf> {
    java.parent()?.parent().map(Path::to_path_buf)
}

fn maven_opts_or_default(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MAVEN_OPTS.to_string())
}

/// Require the orchestrator executable to be reachable.
pub fn require_orchestrator(path: &Path) -> Result<PathBuf> {
    which::which(path).with_context(|| {
        format!(
            "Could not locate Maven command: '{}'. Specify the Maven command with the --mvn flag",
            path.display()
        )
    })
}

/// Short git revision of the project, if git is available and the home is a checkout.
pub fn git_revision(home: &Path) -> Option<String> {
    which::which("git").ok()?;
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(home)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if rev.is_empty() {
        None
    } else {
        Some(rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_project_home_from_nested_dir() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().join("kyuubi");
        fs::create_dir_all(home.join("externals/kyuubi-spark-sql-engine/src")).unwrap();
        fs::write(home.join("pom.xml"), "<project/>").unwrap();

        let nested = home.join("externals/kyuubi-spark-sql-engine/src");
        assert_eq!(locate_project_home_from(&nested).unwrap(), home);
    }

    #[test]
    fn test_locate_project_home_skips_module_poms() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().join("kyuubi");
        let module = home.join("kyuubi-server");
        fs::create_dir_all(home.join("externals")).unwrap();
        fs::create_dir_all(&module).unwrap();
        fs::write(home.join("pom.xml"), "<project/>").unwrap();
        fs::write(module.join("pom.xml"), "<project/>").unwrap();

        assert_eq!(locate_project_home_from(&module).unwrap(), home);
    }

    #[test]
    fn test_locate_project_home_fails_outside_tree() {
        let temp = TempDir::new().unwrap();
        assert!(locate_project_home_from(temp.path()).is_err());
    }

    #[test]
    fn test_parse_rpm_java_home() {
        assert_eq!(parse_rpm_java_home("%java_home\n"), None);
        assert_eq!(parse_rpm_java_home("  \n"), None);
        assert_eq!(
            parse_rpm_java_home("/usr/lib/jvm/java\n"),
            Some(PathBuf::from("/usr/lib/jvm/java"))
        );
    }

    #[test]
    fn test_java_home_from_executable() {
        assert_eq!(
            java_home_from_executable(Path::new("/usr/bin/java")),
            Some(PathBuf::from("/usr"))
        );
        assert_eq!(java_home_from_executable(Path::new("java")), None);
    }

    #[test]
    fn test_maven_opts_default() {
        assert_eq!(maven_opts_or_default(None), DEFAULT_MAVEN_OPTS);
        assert_eq!(maven_opts_or_default(Some(" ".into())), DEFAULT_MAVEN_OPTS);
        assert_eq!(maven_opts_or_default(Some("-Xmx4g".into())), "-Xmx4g");
    }

    #[test]
    fn test_require_orchestrator_missing() {
        let err = require_orchestrator(Path::new("/definitely/not/a/real/mvn")).unwrap_err();
        assert!(err.to_string().contains("Could not locate Maven command"));
    }

    #[cfg(unix)]
    #[test]
    fn test_require_orchestrator_present() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let mvn = temp.path().join("mvn");
        fs::write(&mvn, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&mvn, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(require_orchestrator(&mvn).is_ok());
    }
}
