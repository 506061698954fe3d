use anyhow::{Context as _, Result, anyhow, bail};
use cow_utils::CowUtils;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::combine::Combine;
use crate::context::Context;
use crate::dirs::{CONFIG_FILE, system_config_file, user_cache_dir, user_config_dir};
use crate::impl_combine_table;

const DEFAULT_PLATFORMS: &[&str] = &["ios", "android"];

const DEFAULT_SOURCE_EXTS: &[&str] = &["js", "jsx", "ts", "tsx", "json"];

const DEFAULT_ASSET_EXTS: &[&str] = &[
    // Image formats
    "bmp", "gif", "jpg", "jpeg", "png", "psd", "svg", "webp", //
    // Video formats
    "m4v", "mov", "mp4", "mpeg", "mpg", "webm", //
    // Audio formats
    "aac", "aiff", "caf", "m4a", "mp3", "wav", //
    // Document formats
    "html", "pdf", //
    // Font formats
    "otf", "ttf",
];

/// One layer of configuration as written in a `rnbundle.toml` (or derived from the
/// environment). Every field is optional so layers can be combined.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub cache_dir: Option<PathBuf>,
    pub resolver: Option<ResolverOptions>,
    pub bundler: Option<BundlerOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResolverOptions {
    pub platforms: Option<Vec<String>>,
    pub source_exts: Option<Vec<String>>,
    pub asset_exts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BundlerOptions {
    /// esbuild executable: a name looked up on `PATH`, or a path relative to the project root
    pub esbuild: Option<String>,
    pub target: Option<String>,
    pub format: Option<String>,
    pub extra_args: Option<Vec<String>>,
}

impl Combine for ConfigFile {
    fn combine(self, other: Self) -> Self {
        Self {
            cache_dir: self.cache_dir.combine(other.cache_dir),
            resolver: self.resolver.combine(other.resolver),
            bundler: self.bundler.combine(other.bundler),
        }
    }
}

impl Combine for ResolverOptions {
    fn combine(self, other: Self) -> Self {
        Self {
            platforms: self.platforms.combine(other.platforms),
            source_exts: self.source_exts.combine(other.source_exts),
            asset_exts: self.asset_exts.combine(other.asset_exts),
        }
    }
}

impl Combine for BundlerOptions {
    fn combine(self, other: Self) -> Self {
        Self {
            esbuild: self.esbuild.combine(other.esbuild),
            target: self.target.combine(other.target),
            format: self.format.combine(other.format),
            extra_args: self.extra_args.combine(other.extra_args),
        }
    }
}

impl_combine_table!(ResolverOptions);
impl_combine_table!(BundlerOptions);

impl ConfigFile {
    /// Load a single config file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Configuration values from environment variables with the `RNBUNDLE_` prefix
    pub fn from_env() -> Self {
        let resolver = ResolverOptions {
            // Platform names are matched case-sensitively against --platform, so normalize here
            platforms: env_list("RNBUNDLE_PLATFORMS").map(|platforms| {
                platforms
                    .iter()
                    .map(|p| p.cow_to_lowercase().into_owned())
                    .collect()
            }),
            source_exts: env_list("RNBUNDLE_SOURCE_EXTS"),
            asset_exts: env_list("RNBUNDLE_ASSET_EXTS"),
        };
        let bundler = BundlerOptions {
            esbuild: env::var("RNBUNDLE_ESBUILD").ok(),
            target: env::var("RNBUNDLE_TARGET").ok(),
            ..BundlerOptions::default()
        };

        Self {
            cache_dir: env::var_os("RNBUNDLE_CACHE_DIR").map(PathBuf::from),
            resolver: (resolver != ResolverOptions::default()).then_some(resolver),
            bundler: (bundler != BundlerOptions::default()).then_some(bundler),
        }
    }
}

/// Comma-separated list from an environment variable; `None` if unset or empty.
fn env_list(name: &str) -> Option<Vec<String>> {
    let value = env::var(name).ok()?;
    let items: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// Options forwarded from the command line to [`Config::load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions<'a> {
    pub reset_cache: bool,
    pub config: Option<&'a Path>,
}

/// Fully resolved bundler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Project root, the working directory of the bundler
    pub root: PathBuf,
    /// Whether the server must discard its cache before building
    pub reset_cache: bool,
    pub cache_dir: PathBuf,
    pub resolver: ResolverConfig,
    pub bundler: EsbuildConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    pub platforms: Vec<String>,
    pub source_exts: Vec<String>,
    pub asset_exts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EsbuildConfig {
    pub esbuild: String,
    pub target: String,
    pub format: String,
    pub extra_args: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            reset_cache: false,
            cache_dir: user_cache_dir(),
            resolver: ResolverConfig::default(),
            bundler: EsbuildConfig::default(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            platforms: owned(DEFAULT_PLATFORMS),
            source_exts: owned(DEFAULT_SOURCE_EXTS),
            asset_exts: owned(DEFAULT_ASSET_EXTS),
        }
    }
}

impl Default for EsbuildConfig {
    fn default() -> Self {
        Self {
            esbuild: "esbuild".to_owned(),
            target: "es2016".to_owned(),
            format: "iife".to_owned(),
            extra_args: Vec::new(),
        }
    }
}

impl Config {
    /// Build a configuration for `root` from a combined config layer, filling gaps with defaults.
    pub fn from_file(root: &Path, file: ConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let resolver = file.resolver.unwrap_or_default();
        let bundler = file.bundler.unwrap_or_default();

        let config = Self {
            root: root.to_path_buf(),
            reset_cache: false,
            cache_dir: file
                .cache_dir
                .map_or(defaults.cache_dir, |dir| root.join(dir)),
            resolver: ResolverConfig {
                platforms: resolver.platforms.unwrap_or(defaults.resolver.platforms),
                source_exts: resolver.source_exts.unwrap_or(defaults.resolver.source_exts),
                asset_exts: resolver.asset_exts.unwrap_or(defaults.resolver.asset_exts),
            },
            bundler: EsbuildConfig {
                esbuild: bundler.esbuild.unwrap_or(defaults.bundler.esbuild),
                target: bundler.target.unwrap_or(defaults.bundler.target),
                format: bundler.format.unwrap_or(defaults.bundler.format),
                extra_args: bundler.extra_args.unwrap_or(defaults.bundler.extra_args),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.resolver.platforms.is_empty() {
            bail!("Invalid resolver config: `platforms` must list at least one platform");
        }
        for platform in &self.resolver.platforms {
            let valid = !platform.is_empty()
                && platform
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
            if !valid {
                return Err(anyhow!(
                    "Invalid platform name {:?} in resolver config. Platform names must be lowercase ASCII letters, digits, '-' or '_'",
                    platform
                ));
            }
        }
        Ok(())
    }

    /// Returns whether `platform` is one of the configured platforms.
    pub fn supports_platform(&self, platform: &str) -> bool {
        self.resolver.platforms.iter().any(|p| p == platform)
    }

    fn try_load_layer(layers: &mut ConfigFile, path: &Path, context: &str) -> Result<()> {
        if path.exists() {
            log::debug!("Loading {} from: {:?}", context, path);
            let loaded = ConfigFile::from_path(path)
                .with_context(|| format!("Failed to load {} from {:?}", context, path))?;
            *layers = loaded.combine(std::mem::take(layers));
        }
        Ok(())
    }

    /// Load configuration with hierarchical precedence:
    /// 1. `--config` path (highest precedence, must exist)
    /// 2. Environment variables (`RNBUNDLE_*`)
    /// 3. Project config (`rnbundle.toml` in the project root)
    /// 4. User config (~/.config/rnbundle/rnbundle.toml)
    /// 5. System config (/etc/rnbundle/rnbundle.toml or equivalent)
    /// 6. Default values (lowest precedence)
    pub fn load(ctx: &Context, options: &LoadOptions<'_>) -> Result<Self> {
        let mut layers = ConfigFile::default();

        if let Some(system_config_path) = system_config_file() {
            Self::try_load_layer(&mut layers, &system_config_path, "system config")?;
        }

        if let Some(user_config_dir) = user_config_dir() {
            Self::try_load_layer(&mut layers, &user_config_dir.join(CONFIG_FILE), "user config")?;
        }

        Self::try_load_layer(&mut layers, &ctx.root.join(CONFIG_FILE), "project config")?;

        layers = ConfigFile::from_env().combine(layers);

        if let Some(cli_config_path) = options.config {
            let cli_config_path = ctx.root.join(cli_config_path);
            if !cli_config_path.is_file() {
                bail!("Config file not found: {:?}", cli_config_path);
            }
            Self::try_load_layer(&mut layers, &cli_config_path, "CLI config")?;
        }

        let mut config = Self::from_file(&ctx.root, layers)?;
        config.reset_cache = options.reset_cache;
        Ok(config)
    }
}
