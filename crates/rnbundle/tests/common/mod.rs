use std::ffi::OsString;
use tempfile::TempDir;

const ISOLATED_VARS: &[&str] = &[
    "RNBUNDLE_PLATFORMS",
    "RNBUNDLE_SOURCE_EXTS",
    "RNBUNDLE_ASSET_EXTS",
    "RNBUNDLE_ESBUILD",
    "RNBUNDLE_TARGET",
    "RNBUNDLE_CACHE_DIR",
    "XDG_CONFIG_HOME",
    "XDG_CONFIG_DIRS",
];

/// Isolates config loading from the machine running the tests: clears the `RNBUNDLE_*`
/// variables, points the user and XDG system config dirs at an empty temp dir and then applies
/// `values`. Everything is restored on drop. Tests holding one must be `#[serial]`.
pub struct EnvGuard {
    original: Vec<(&'static str, Option<OsString>)>,
    _config_home: TempDir,
}

impl EnvGuard {
    pub fn new(values: &[(&'static str, &str)]) -> Self {
        let config_home = TempDir::new().expect("temp config home");
        let original = ISOLATED_VARS
            .iter()
            .map(|name| (*name, std::env::var_os(name)))
            .collect();

        // SAFETY: every test that creates a guard runs under #[serial]
        unsafe {
            for name in ISOLATED_VARS {
                std::env::remove_var(name);
            }
            std::env::set_var("XDG_CONFIG_HOME", config_home.path());
            std::env::set_var("XDG_CONFIG_DIRS", config_home.path());
            for (name, value) in values {
                std::env::set_var(name, value);
            }
        }

        Self {
            original,
            _config_home: config_home,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: restores the state captured in `new`, still under #[serial]
        unsafe {
            for (name, value) in self.original.drain(..) {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
    }
}
