use std::path::PathBuf;

use clap::{Args, ValueEnum};

/// Arguments of the `bundle` command.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct BundleArgs {
    /// Path to the root JS file, either absolute or relative to the project root
    #[arg(long)]
    pub entry_file: PathBuf,

    /// Target platform, one of the platforms listed in the resolver config
    #[arg(long, default_value = "ios")]
    pub platform: String,

    /// If false, warnings are disabled and the bundle is minified
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub dev: bool,

    /// Allows overriding whether the bundle is minified. Defaults to the opposite of --dev
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub minify: Option<bool>,

    /// File name where to store the resulting bundle
    #[arg(long)]
    pub bundle_output: PathBuf,

    /// Encoding the bundle should be written in
    #[arg(long, value_enum, default_value_t = BundleEncoding::Utf8)]
    pub bundle_encoding: BundleEncoding,

    /// File name where to store the source map of the resulting bundle
    #[arg(long)]
    pub sourcemap_output: Option<PathBuf>,

    /// Path to make the source map's sources entries relative to
    #[arg(long)]
    pub sourcemap_sources_root: Option<PathBuf>,

    /// Report the full --sourcemap-output path instead of its file name in the bundle
    #[arg(long)]
    pub sourcemap_use_absolute_path: bool,

    /// Directory name where to store assets referenced in the bundle
    #[arg(long)]
    pub assets_dest: Option<PathBuf>,

    /// Removes cached files before building
    #[arg(long)]
    pub reset_cache: bool,

    /// Path to a rnbundle.toml taking precedence over every other config layer
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl BundleArgs {
    /// Arguments for `entry_file` with every other option at its command line default.
    pub fn new(entry_file: impl Into<PathBuf>, bundle_output: impl Into<PathBuf>) -> Self {
        Self {
            entry_file: entry_file.into(),
            platform: "ios".to_owned(),
            dev: true,
            minify: None,
            bundle_output: bundle_output.into(),
            bundle_encoding: BundleEncoding::Utf8,
            sourcemap_output: None,
            sourcemap_sources_root: None,
            sourcemap_use_absolute_path: false,
            assets_dest: None,
            reset_cache: false,
            config: None,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleEncoding {
    #[default]
    Utf8,
    Utf16le,
}

impl BundleEncoding {
    pub fn encode(self, code: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => code.as_bytes().to_vec(),
            Self::Utf16le => code.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        }
    }
}
