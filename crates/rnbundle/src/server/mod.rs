//! The bundler server: the component that turns an entry file into a bundle and knows which
//! assets the bundle references.

pub mod esbuild;

pub use esbuild::EsbuildServer;

use anyhow::Result;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use crate::assets::AssetData;

/// Development or production build. Passed explicitly to the bundler instead of through the
/// process environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    pub fn from_dev(dev: bool) -> Self {
        if dev {
            Self::Development
        } else {
            Self::Production
        }
    }

    /// Value bundled code sees as `process.env.NODE_ENV`
    pub fn node_env(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub fn is_dev(self) -> bool {
        self == Self::Development
    }
}

/// What to bundle and how.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestOptions {
    pub entry_file: PathBuf,
    /// Value of the `sourceMappingURL` trailer, if any
    pub source_map_url: Option<String>,
    pub dev: bool,
    pub minify: bool,
    pub platform: String,
}

impl RequestOptions {
    pub fn mode(&self) -> BuildMode {
        BuildMode::from_dev(self.dev)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BundleType {
    #[default]
    Bundle,
    /// Marks requests that only need the asset list
    Assets,
}

impl BundleType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Assets => "assets",
        }
    }
}

/// Full set of options a server accepts; [`BundleOptions::default`] holds the server defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleOptions {
    pub entry_file: PathBuf,
    pub source_map_url: Option<String>,
    pub dev: bool,
    pub minify: bool,
    pub platform: String,
    pub bundle_type: BundleType,
    pub run_module: bool,
    pub inline_source_map: bool,
    pub exclude_source: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            entry_file: PathBuf::new(),
            source_map_url: None,
            dev: true,
            minify: false,
            platform: String::new(),
            bundle_type: BundleType::Bundle,
            run_module: true,
            inline_source_map: false,
            exclude_source: false,
        }
    }
}

impl BundleOptions {
    /// Server defaults, overridden by `request`, tagged with `bundle_type`.
    pub fn merged(request: &RequestOptions, bundle_type: BundleType) -> Self {
        Self {
            entry_file: request.entry_file.clone(),
            source_map_url: request.source_map_url.clone(),
            dev: request.dev,
            minify: request.minify,
            platform: request.platform.clone(),
            bundle_type,
            ..Self::default()
        }
    }

    /// The request these options were derived from.
    pub fn request(&self) -> RequestOptions {
        RequestOptions {
            entry_file: self.entry_file.clone(),
            source_map_url: self.source_map_url.clone(),
            dev: self.dev,
            minify: self.minify,
            platform: self.platform.clone(),
        }
    }
}

/// A built bundle. `map` holds the source map JSON with absolute `sources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub code: String,
    pub map: Option<String>,
}

pub trait BundlerServer {
    fn build(&mut self, options: &RequestOptions) -> Result<Bundle>;

    fn get_assets(&mut self, options: &BundleOptions) -> Result<Vec<AssetData>>;

    /// Release everything the server holds. Must tolerate being called on an ended server.
    fn end(&mut self);
}

/// Owns a server for the duration of a build and ends it exactly once when dropped, whether
/// the build returned normally, bailed out with `?` or panicked.
#[derive(Debug)]
#[must_use = "the server is ended as soon as the guard is dropped"]
pub struct ServerGuard<S: BundlerServer> {
    server: S,
}

impl<S: BundlerServer> ServerGuard<S> {
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: BundlerServer> Deref for ServerGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.server
    }
}

impl<S: BundlerServer> DerefMut for ServerGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.server
    }
}

impl<S: BundlerServer> Drop for ServerGuard<S> {
    fn drop(&mut self) {
        log::debug!("Ending bundler server");
        self.server.end();
    }
}
