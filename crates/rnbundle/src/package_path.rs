//! Locates the framework package relative to where rnbundle is installed.
//!
//! The lookup order is:
//! 1. Yarn Plug'n'Play, when the project has a PnP manifest and `node` is available,
//! 2. a flat `node_modules` layout where rnbundle sits next to the package,
//! 3. rnbundle nested inside the package's own `node_modules`.
//!
//! The base path is computed once per [`PackagePathResolver`].

use log::{debug, warn};
use once_cell::unsync::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use sugar_path::SugarPath;

pub const DEFAULT_PACKAGE: &str = "react-native";

const PNP_MANIFESTS: &[&str] = &[".pnp.cjs", ".pnp.js"];

const PNP_RESOLVE_SCRIPT: &str = "const api = require(process.argv[1]);\
process.stdout.write(api.resolveToUnqualified(process.argv[2], process.argv[3]));";

/// Package-manager aware resolution (Yarn PnP `resolveToUnqualified`).
pub trait UnqualifiedResolver {
    /// Location of `package` as seen from `from_dir`, or `None` when the package manager cannot
    /// answer.
    fn resolve_to_unqualified(&self, package: &str, from_dir: &Path) -> Option<PathBuf>;
}

/// Filesystem existence check.
pub trait PathProbe {
    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Asks the project's Yarn PnP runtime through `node`.
#[derive(Debug, Clone)]
pub struct PnpResolver {
    manifest: PathBuf,
    node: PathBuf,
}

impl PnpResolver {
    /// Finds a PnP manifest in `cwd` or one of its ancestors and a `node` executable.
    ///
    /// Returns `None` when the project is not a PnP install.
    pub fn detect(cwd: &Path) -> Option<Self> {
        let manifest = cwd.ancestors().find_map(|dir| {
            PNP_MANIFESTS
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        })?;
        match which::which("node") {
            Ok(node) => Some(Self { manifest, node }),
            Err(err) => {
                debug!("Found {:?} but no node executable: {}", manifest, err);
                None
            }
        }
    }

}

impl UnqualifiedResolver for PnpResolver {
    fn resolve_to_unqualified(&self, package: &str, from_dir: &Path) -> Option<PathBuf> {
        // PnP treats an issuer ending in a separator as a directory
        let issuer = format!("{}/", from_dir.to_slash_lossy().trim_end_matches('/'));
        let output = Command::new(&self.node)
            .arg("-e")
            .arg(PNP_RESOLVE_SCRIPT)
            .arg(&self.manifest)
            .arg(package)
            .arg(&issuer)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let resolved = String::from_utf8_lossy(&output.stdout).trim().to_owned();
                (!resolved.is_empty()).then(|| PathBuf::from(resolved))
            }
            Ok(output) => {
                debug!(
                    "PnP could not resolve {}: {}",
                    package,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(err) => {
                debug!("Failed to run node for PnP resolution: {}", err);
                None
            }
        }
    }
}

/// Detects Yarn PnP on first use, so resolvers that are never asked cost nothing.
#[derive(Debug)]
pub struct DeferredPnp {
    cwd: PathBuf,
    detected: OnceCell<Option<PnpResolver>>,
}

impl DeferredPnp {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            detected: OnceCell::new(),
        }
    }

    fn detected(&self) -> Option<&PnpResolver> {
        self.detected
            .get_or_init(|| PnpResolver::detect(&self.cwd))
            .as_ref()
    }

    /// Whether detection has run yet.
    pub fn is_detected(&self) -> bool {
        self.detected.get().is_some()
    }
}

impl UnqualifiedResolver for DeferredPnp {
    fn resolve_to_unqualified(&self, package: &str, from_dir: &Path) -> Option<PathBuf> {
        self.detected()?.resolve_to_unqualified(package, from_dir)
    }
}

pub struct PackagePathResolver {
    package: String,
    hook: Option<Box<dyn UnqualifiedResolver>>,
    cwd: PathBuf,
    module_dir: PathBuf,
    probe: Box<dyn PathProbe>,
    base: OnceCell<PathBuf>,
}

impl fmt::Debug for PackagePathResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagePathResolver")
            .field("package", &self.package)
            .field("has_hook", &self.hook.is_some())
            .field("cwd", &self.cwd)
            .field("module_dir", &self.module_dir)
            .field("base", &self.base.get())
            .finish_non_exhaustive()
    }
}

impl PackagePathResolver {
    /// Resolver for `package` in the environment rnbundle runs in.
    pub fn new(package: &str) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let module_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let hook: Box<dyn UnqualifiedResolver> = Box::new(DeferredPnp::new(cwd.clone()));

        Self::with_probes(package, Some(hook), cwd, module_dir, Box::new(FsProbe))
    }

    /// Resolver with every environment dependency supplied by the caller.
    pub fn with_probes(
        package: &str,
        hook: Option<Box<dyn UnqualifiedResolver>>,
        cwd: PathBuf,
        module_dir: PathBuf,
        probe: Box<dyn PathProbe>,
    ) -> Self {
        Self {
            package: package.to_owned(),
            hook,
            cwd,
            module_dir,
            probe,
            base: OnceCell::new(),
        }
    }

    /// Path of `sub_path` inside the package.
    ///
    /// Never fails: if no layout matches, the nested-layout guess is returned anyway.
    pub fn resolve(&self, sub_path: impl AsRef<Path>) -> PathBuf {
        self.base().join(sub_path)
    }

    /// Location of the package itself, computed on first use.
    pub fn base(&self) -> &Path {
        self.base.get_or_init(|| self.find_base())
    }

    fn find_base(&self) -> PathBuf {
        if let Some(hook) = &self.hook {
            let from_dir = self.cwd.parent().unwrap_or(&self.cwd);
            if let Some(path) = hook.resolve_to_unqualified(&self.package, from_dir) {
                debug!("Resolved {} through the package manager: {:?}", self.package, path);
                return path;
            }
        }

        // rnbundle lives in node_modules next to the package
        let flat = Path::new("..").join("..").join(&self.package);
        if self.probe.exists(&self.module_dir.join(&flat)) {
            debug!("Resolved {} as a sibling install: {:?}", self.package, flat);
            return flat;
        }

        // Otherwise rnbundle is inside the package's own node_modules
        let nested = Path::new("..").join("..").join("..");
        if !self
            .probe
            .exists(&self.module_dir.join(&nested).join("package.json"))
        {
            warn!(
                "Could not locate the {} package from {:?}; falling back to {:?}",
                self.package, self.module_dir, nested
            );
        }
        nested
    }
}
