use anyhow::{Context as _, Result};
use std::path::PathBuf;

use crate::package_path::PackagePathResolver;

/// Per-invocation state shared by the commands: where the project lives and how to reach the
/// framework package next to it.
#[derive(Debug)]
pub struct Context {
    /// Project root. Config lookup and the bundler's working directory are relative to it.
    pub root: PathBuf,
    pub package_path: PackagePathResolver,
}

impl Context {
    pub fn new(root: impl Into<PathBuf>, package_path: PackagePathResolver) -> Self {
        Self {
            root: root.into(),
            package_path,
        }
    }

    /// Context rooted at the current working directory, resolving `package` from the
    /// environment the executable runs in.
    pub fn from_current_dir(package: &str) -> Result<Self> {
        let root = std::env::current_dir().context("Failed to read the current directory")?;
        Ok(Self::new(root, PackagePathResolver::new(package)))
    }
}
