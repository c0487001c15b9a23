//! Project bootstrap: toolchain check, data directories, `.env`, build and
//! verification. Driven by the `setup` binary.

use semver::Version;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Oldest `rustc` the workspace builds with.
pub const MIN_RUST_VERSION: Version = Version::new(1, 85, 0);

pub const REQUIRED_DIRECTORIES: &[&str] = &["data", "data/chroma_db", "tests"];

/// Binaries that must exist under `target/release` after installation.
pub const REQUIRED_BINARIES: &[&str] = &["api", "mcp-server"];

/// Compiler cache used for the release build when present; setup continues without it.
pub const OPTIONAL_TOOL: &str = "sccache";

pub const DEFAULT_ENV_TEMPLATE: &str = include_str!("../.env.example");

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("rustc not found: {0}")]
    ToolchainMissing(String),

    #[error("could not parse rustc version from {0:?}")]
    VersionParse(String),

    #[error("rustc {found} is too old, {required} or newer is required")]
    ToolchainTooOld { found: Version, required: Version },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("installation failed: {0}")]
    InstallFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFileOutcome {
    AlreadyPresent,
    CopiedFromExample,
    WrittenDefault,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SetupError + '_ {
    move |source| SetupError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Extracts the version from `rustc --version` output, e.g. `rustc 1.82.0 (f6e511eec 2024-10-15)`.
pub fn parse_rustc_version(output: &str) -> Result<Version, SetupError> {
    output
        .split_whitespace()
        .nth(1)
        .and_then(|raw| Version::parse(raw).ok())
        .ok_or_else(|| SetupError::VersionParse(output.trim().to_string()))
}

pub fn check_version(found: &Version, required: &Version) -> Result<(), SetupError> {
    // Nightly and beta builds of the minimum release are accepted.
    let release = Version::new(found.major, found.minor, found.patch);
    if release < *required {
        return Err(SetupError::ToolchainTooOld {
            found: found.clone(),
            required: required.clone(),
        });
    }
    Ok(())
}

pub fn check_toolchain() -> Result<Version, SetupError> {
    let output = Command::new("rustc")
        .arg("--version")
        .output()
        .map_err(|e| SetupError::ToolchainMissing(e.to_string()))?;
    if !output.status.success() {
        return Err(SetupError::ToolchainMissing(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let version = parse_rustc_version(&String::from_utf8_lossy(&output.stdout))?;
    check_version(&version, &MIN_RUST_VERSION)?;
    Ok(version)
}

pub fn tool_available(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Creates every required directory under `root`; returns the ones that did not exist.
pub fn ensure_directories(root: &Path) -> Result<Vec<PathBuf>, SetupError> {
    let mut created = Vec::new();
    for dir in REQUIRED_DIRECTORIES {
        let path = root.join(dir);
        if path.is_dir() {
            continue;
        }
        std::fs::create_dir_all(&path).map_err(io_error(&path))?;
        created.push(path);
    }
    Ok(created)
}

/// Materializes `.env` without ever overwriting an existing one.
pub fn create_env_file(root: &Path) -> Result<EnvFileOutcome, SetupError> {
    let env = root.join(".env");
    if env.exists() {
        return Ok(EnvFileOutcome::AlreadyPresent);
    }

    let example = root.join(".env.example");
    if example.is_file() {
        std::fs::copy(&example, &env).map_err(io_error(&env))?;
        return Ok(EnvFileOutcome::CopiedFromExample);
    }

    std::fs::write(&env, DEFAULT_ENV_TEMPLATE).map_err(io_error(&env))?;
    Ok(EnvFileOutcome::WrittenDefault)
}

/// `y`/`yes` in any case; anything else, including an empty answer, declines.
pub fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub fn install_optional_tool() -> Result<(), SetupError> {
    let status = Command::new("cargo")
        .args(["install", OPTIONAL_TOOL, "--locked"])
        .status()
        .map_err(|e| SetupError::InstallFailed(format!("could not run cargo: {e}")))?;

    if !status.success() {
        return Err(SetupError::InstallFailed(format!(
            "cargo install {OPTIONAL_TOOL} exited with {status}"
        )));
    }
    Ok(())
}

/// Builds every binary in release mode, through the compiler cache when `use_cache` is set.
pub fn install(root: &Path, use_cache: bool) -> Result<(), SetupError> {
    let mut cargo = Command::new("cargo");
    cargo.args(["build", "--release", "--bins"]).current_dir(root);
    if use_cache {
        cargo.env("RUSTC_WRAPPER", OPTIONAL_TOOL);
    }

    let status = cargo
        .status()
        .map_err(|e| SetupError::InstallFailed(format!("could not run cargo: {e}")))?;

    if !status.success() {
        return Err(SetupError::InstallFailed(format!("cargo build exited with {status}")));
    }
    Ok(())
}

pub fn binary_path(root: &Path, name: &str) -> PathBuf {
    root.join("target")
        .join("release")
        .join(format!("{name}{}", std::env::consts::EXE_SUFFIX))
}

/// Names of the check-list items that are missing. Empty means the install is complete.
pub fn verify_installation(root: &Path) -> Vec<String> {
    REQUIRED_BINARIES
        .iter()
        .filter(|name| !binary_path(root, name).is_file())
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rustc_version() {
        let version = parse_rustc_version("rustc 1.82.0 (f6e511eec 2024-10-15)\n").unwrap();
        assert_eq!(version, Version::new(1, 82, 0));

        let nightly = parse_rustc_version("rustc 1.85.0-nightly (abc 2024-12-01)").unwrap();
        assert_eq!(nightly.minor, 85);

        assert!(matches!(
            parse_rustc_version("command not found"),
            Err(SetupError::VersionParse(_))
        ));
    }

    #[test]
    fn test_version_gate() {
        assert!(check_version(&Version::new(1, 85, 0), &MIN_RUST_VERSION).is_ok());
        assert!(check_version(&Version::parse("1.85.0-beta.3").unwrap(), &MIN_RUST_VERSION).is_ok());
        assert!(matches!(
            check_version(&Version::new(1, 84, 1), &MIN_RUST_VERSION),
            Err(SetupError::ToolchainTooOld { .. })
        ));
    }

    #[test]
    fn test_parse_confirmation() {
        for yes in ["y", "Y", "yes", " YES\n"] {
            assert!(parse_confirmation(yes), "{yes:?}");
        }
        for no in ["", "\n", "n", "no", "yep"] {
            assert!(!parse_confirmation(no), "{no:?}");
        }
    }

    #[test]
    fn test_ensure_directories_is_idempotent() {
        let root = tempfile::tempdir().unwrap();

        let created = ensure_directories(root.path()).unwrap();
        assert_eq!(created.len(), 3);
        for dir in REQUIRED_DIRECTORIES {
            assert!(root.path().join(dir).is_dir());
        }

        assert!(ensure_directories(root.path()).unwrap().is_empty());
    }

    #[test]
    fn test_env_file_never_overwritten() {
        let root = tempfile::tempdir().unwrap();
        let env = root.path().join(".env");
        std::fs::write(&env, "OPENAI_API_KEY=mine\n").unwrap();
        std::fs::write(root.path().join(".env.example"), "OPENAI_API_KEY=\n").unwrap();

        assert_eq!(
            create_env_file(root.path()).unwrap(),
            EnvFileOutcome::AlreadyPresent
        );
        assert_eq!(std::fs::read_to_string(&env).unwrap(), "OPENAI_API_KEY=mine\n");
    }

    #[test]
    fn test_env_file_copied_from_example() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(".env.example"), "CHUNK_SIZE=500\n").unwrap();

        assert_eq!(
            create_env_file(root.path()).unwrap(),
            EnvFileOutcome::CopiedFromExample
        );
        assert_eq!(
            std::fs::read_to_string(root.path().join(".env")).unwrap(),
            "CHUNK_SIZE=500\n"
        );
    }

    #[test]
    fn test_env_file_written_from_template() {
        let root = tempfile::tempdir().unwrap();

        assert_eq!(
            create_env_file(root.path()).unwrap(),
            EnvFileOutcome::WrittenDefault
        );
        let written = std::fs::read_to_string(root.path().join(".env")).unwrap();
        for var in [
            "OPENAI_API_KEY",
            "OPENAI_MODEL",
            "OPENAI_EMBEDDING_MODEL",
            "CHROMA_DB_PATH",
            "CHROMA_COLLECTION_NAME",
            "MCP_SERVER_TRANSPORT",
            "MCP_SERVER_COMMAND",
            "MCP_SERVER_ARGS",
            "STREAMLIT_PORT",
            "STREAMLIT_HOST",
            "LOG_LEVEL",
            "CHUNK_SIZE",
            "CHUNK_OVERLAP",
            "TOP_K_CHUNKS",
            "RELEVANCE_THRESHOLD",
            "MAX_ITERATIONS",
            "TEMPERATURE",
        ] {
            assert!(written.contains(&format!("{var}=")), "missing {var}");
        }
    }

    #[test]
    fn test_verify_reports_each_missing_binary() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(verify_installation(root.path()), vec!["api", "mcp-server"]);

        let release = root.path().join("target").join("release");
        std::fs::create_dir_all(&release).unwrap();
        std::fs::write(binary_path(root.path(), "api"), b"").unwrap();
        assert_eq!(verify_installation(root.path()), vec!["mcp-server"]);

        std::fs::write(binary_path(root.path(), "mcp-server"), b"").unwrap();
        assert!(verify_installation(root.path()).is_empty());
    }
}
