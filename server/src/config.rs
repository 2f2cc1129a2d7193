use clap::Parser;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("root {} must be an absolute path", .0.display())]
    RelativeRoot(PathBuf),
    #[error("output directory {} must be inside root {}", .output.display(), .root.display())]
    OutsideRoot { output: PathBuf, root: PathBuf },
    #[error("could not determine the current directory: {0}")]
    CurrentDir(String),
}

/// Serve jobs over gRPC
#[derive(Debug, Parser)]
pub struct Config {
    /// Address to listen on
    #[clap(long, env = "JOBS_ADDR", default_value = "[::1]:50051")]
    pub addr: SocketAddr,

    /// Absolute directory everything the server writes lives under [default: current directory]
    #[clap(long, env = "JOBS_ROOT")]
    pub root: Option<PathBuf>,

    /// Directory for job files, relative to the root
    #[clap(long = "output-dir", env = "JOBS_OUTPUT_DIR", default_value = "user-files")]
    pub output_dir: PathBuf,
}

impl Config {
    /// The directory each job kind gets its own subdirectory of.
    pub fn output_root(&self) -> Result<PathBuf, ConfigError> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().map_err(|e| ConfigError::CurrentDir(e.to_string()))?,
        };
        resolve_output_root(&root, &self.output_dir)
    }
}

/// Join `output` onto `root`, requiring the result to stay strictly below `root`.
///
/// Resolution is lexical so the directories need not exist yet.
pub fn resolve_output_root(root: &Path, output: &Path) -> Result<PathBuf, ConfigError> {
    if !root.is_absolute() {
        return Err(ConfigError::RelativeRoot(root.to_path_buf()));
    }
    let root = normalize(root);
    let resolved = normalize(&root.join(output));
    if resolved == root || !resolved.starts_with(&root) {
        return Err(ConfigError::OutsideRoot {
            output: output.to_path_buf(),
            root,
        });
    }
    Ok(resolved)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
