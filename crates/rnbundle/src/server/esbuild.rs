use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use sugar_path::SugarPath;
use tempfile::TempDir;

use crate::assets::{AssetData, collect_assets};
use crate::config::{Config, EsbuildConfig, ResolverConfig};
use crate::server::{Bundle, BundleOptions, BundlerServer, RequestOptions};

/// Name prefix of the per-run staging directories under the cache directory
const STAGING_PREFIX: &str = "build-";

/// The parts of an esbuild metafile the server reads.
#[derive(Debug, Deserialize)]
struct Metafile {
    /// Keyed by path relative to the esbuild working directory
    inputs: IndexMap<String, serde::de::IgnoredAny>,
}

/// Bundler server backed by the esbuild executable.
///
/// Builds are staged in a private directory under the cache directory; [`BundlerServer::end`]
/// removes it.
#[derive(Debug)]
pub struct EsbuildServer {
    esbuild_path: PathBuf,
    root: PathBuf,
    resolver: ResolverConfig,
    options: EsbuildConfig,
    staging: Option<TempDir>,
    /// Metafile of the last build and the request that produced it
    last_metafile: Option<(RequestOptions, PathBuf)>,
    builds: usize,
}

impl EsbuildServer {
    /// Start a server for `config`, locating esbuild as configured.
    pub fn new(config: &Config) -> Result<Self> {
        let esbuild_path = locate_esbuild(&config.root, &config.bundler.esbuild)?;
        Self::with_executable(config, esbuild_path)
    }

    /// Start a server that runs the esbuild executable at `esbuild_path`.
    pub fn with_executable(config: &Config, esbuild_path: PathBuf) -> Result<Self> {
        if config.reset_cache {
            reset_cache_dir(&config.cache_dir)?;
        }
        fs::create_dir_all(&config.cache_dir)
            .with_context(|| format!("Failed to create cache directory {:?}", config.cache_dir))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&config.cache_dir)
            .with_context(|| {
                format!("Failed to create staging directory in {:?}", config.cache_dir)
            })?;
        debug!("Staging builds in {:?} using {:?}", staging.path(), esbuild_path);

        Ok(Self {
            esbuild_path,
            root: config.root.clone(),
            resolver: config.resolver.clone(),
            options: config.bundler.clone(),
            staging: Some(staging),
            last_metafile: None,
            builds: 0,
        })
    }

    fn staging_dir(&self) -> Result<PathBuf> {
        self.staging
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| anyhow!("The bundler server has already been ended"))
    }

    /// Comma-separated `--resolve-extensions` value: for each source extension, the platform
    /// variant first, then the `native` variant, then the plain file.
    pub fn resolve_extensions(&self, platform: &str) -> String {
        self.resolver
            .source_exts
            .iter()
            .flat_map(|ext| {
                [
                    format!(".{platform}.{ext}"),
                    format!(".native.{ext}"),
                    format!(".{ext}"),
                ]
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Command line for building `options` into `outfile`.
    pub fn esbuild_args(
        &self,
        options: &RequestOptions,
        outfile: &Path,
        metafile: &Path,
    ) -> Vec<String> {
        let mode = options.mode();
        let mut args = vec![
            options.entry_file.to_string_lossy().into_owned(),
            "--bundle".to_owned(),
            format!("--outfile={}", outfile.display()),
            format!("--format={}", self.options.format),
            format!("--target={}", self.options.target),
            "--sourcemap=external".to_owned(),
            format!("--metafile={}", metafile.display()),
            format!("--define:process.env.NODE_ENV=\"{}\"", mode.node_env()),
            format!("--define:__DEV__={}", mode.is_dev()),
            format!("--resolve-extensions={}", self.resolve_extensions(&options.platform)),
        ];

        // Assets are emitted as files so they show up in the metafile inputs
        for ext in &self.resolver.asset_exts {
            args.push(format!("--loader:.{ext}=file"));
        }

        if options.minify {
            args.push("--minify".to_owned());
        }

        args.extend(self.options.extra_args.iter().cloned());
        args
    }

    fn run(&self, options: &RequestOptions, outfile: &Path, metafile: &Path) -> Result<()> {
        let args = self.esbuild_args(options, outfile, metafile);
        debug!("Running {:?} {}", self.esbuild_path, args.join(" "));

        let output = Command::new(&self.esbuild_path)
            .args(&args)
            .current_dir(&self.root)
            .env("NODE_ENV", options.mode().node_env())
            .output()
            .with_context(|| format!("Failed to execute esbuild at {:?}", self.esbuild_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "esbuild failed to bundle {:?}: {}",
                options.entry_file,
                stderr.trim()
            );
        }
        Ok(())
    }

    /// Build into fresh staging paths, returning the output and metafile locations.
    fn build_staged(&mut self, options: &RequestOptions) -> Result<(PathBuf, PathBuf)> {
        let staging = self.staging_dir()?;
        self.builds += 1;
        let outfile = staging.join(format!("bundle-{}.js", self.builds));
        let metafile = staging.join(format!("meta-{}.json", self.builds));
        self.run(options, &outfile, &metafile)?;
        Ok((outfile, metafile))
    }

    fn read_metafile(path: &Path) -> Result<Metafile> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read esbuild metafile {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse esbuild metafile {:?}", path))
    }

    fn is_asset(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.resolver
                    .asset_exts
                    .iter()
                    .any(|asset_ext| asset_ext.eq_ignore_ascii_case(ext))
            })
    }
}

impl BundlerServer for EsbuildServer {
    fn build(&mut self, options: &RequestOptions) -> Result<Bundle> {
        let (outfile, metafile) = self.build_staged(options)?;

        let mut code = fs::read_to_string(&outfile)
            .with_context(|| format!("Failed to read bundle {:?}", outfile))?;

        let map_path = PathBuf::from(format!("{}.map", outfile.display()));
        let map = if map_path.is_file() {
            let raw = fs::read_to_string(&map_path)
                .with_context(|| format!("Failed to read source map {:?}", map_path))?;
            let base = map_path.parent().unwrap_or(&self.root);
            Some(absolutize_sources(&raw, base)?)
        } else {
            None
        };

        if let Some(url) = &options.source_map_url {
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(&format!("//# sourceMappingURL={url}\n"));
        }

        self.last_metafile = Some((options.clone(), metafile));
        Ok(Bundle { code, map })
    }

    fn get_assets(&mut self, options: &BundleOptions) -> Result<Vec<AssetData>> {
        let request = options.request();
        let metafile = match &self.last_metafile {
            Some((last, path)) if *last == request => path.clone(),
            _ => {
                debug!("No build for this request yet, running esbuild for the asset list");
                self.build_staged(&request)?.1
            }
        };

        let meta = Self::read_metafile(&metafile)?;
        let files: Vec<PathBuf> = meta
            .inputs
            .keys()
            .filter(|input| self.is_asset(input))
            .map(|input| self.root.join(input).normalize())
            .collect();
        debug!("Bundle references {} asset files", files.len());

        collect_assets(
            &self.root,
            &files,
            &options.platform,
            &self.resolver.platforms,
        )
    }

    fn end(&mut self) {
        self.last_metafile = None;
        if let Some(staging) = self.staging.take() {
            let path = staging.path().to_path_buf();
            match staging.close() {
                Ok(()) => debug!("Removed staging directory {:?}", path),
                Err(err) => warn!("Failed to remove staging directory {:?}: {}", path, err),
            }
        }
    }
}

/// Resolve the configured esbuild: a bare name is looked up on `PATH`, anything with a
/// directory component is taken relative to the project root.
fn locate_esbuild(root: &Path, command: &str) -> Result<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        let path = root.join(candidate);
        if !path.is_file() {
            bail!("esbuild executable not found at {:?}", path);
        }
        return Ok(path);
    }

    which::which(command).with_context(|| {
        format!(
            "`{command}` not found on PATH. Install it with: npm install -g esbuild\n\
             esbuild is required to build bundles."
        )
    })
}

/// Remove staging directories left behind by interrupted runs. Only `build-*` directories are
/// touched; anything else under the cache directory is not ours.
fn reset_cache_dir(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        return Ok(());
    }
    info!("Resetting bundler cache at {:?}", cache_dir);
    let entries = fs::read_dir(cache_dir)
        .with_context(|| format!("Failed to read cache directory {:?}", cache_dir))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to read cache directory {:?}", cache_dir))?;
        let is_staging = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(STAGING_PREFIX));
        if !is_staging || !entry.path().is_dir() {
            continue;
        }
        let path = entry.path();
        debug!("Removing stale staging directory {:?}", path);
        fs::remove_dir_all(&path).with_context(|| format!("Failed to remove cached {:?}", path))?;
    }
    Ok(())
}

/// Rewrite a source map's `sources` from paths relative to the map file into absolute paths.
fn absolutize_sources(map: &str, base: &Path) -> Result<String> {
    let mut value: serde_json::Value =
        serde_json::from_str(map).context("Failed to parse esbuild source map")?;

    if let Some(serde_json::Value::Array(sources)) = value.get_mut("sources") {
        for source in sources {
            if let serde_json::Value::String(path) = source {
                let joined = base.join(&*path);
                let absolute = joined.canonicalize().unwrap_or_else(|_| joined.normalize());
                *path = absolute.to_string_lossy().into_owned();
            }
        }
    }

    serde_json::to_string(&value).context("Failed to serialize source map")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server(cache: &TempDir, reset_cache: bool) -> EsbuildServer {
        let config = Config {
            root: PathBuf::from("/project"),
            cache_dir: cache.path().to_path_buf(),
            reset_cache,
            ..Config::default()
        };
        EsbuildServer::with_executable(&config, PathBuf::from("/usr/bin/esbuild"))
            .expect("server should start")
    }

    fn request(dev: bool, minify: bool) -> RequestOptions {
        RequestOptions {
            entry_file: PathBuf::from("index.js"),
            source_map_url: None,
            dev,
            minify,
            platform: "android".to_owned(),
        }
    }

    #[test]
    fn test_production_args() {
        let cache = TempDir::new().unwrap();
        let server = server(&cache, false);
        let args = server.esbuild_args(
            &request(false, true),
            Path::new("/tmp/out.js"),
            Path::new("/tmp/meta.json"),
        );

        assert_eq!(args[0], "index.js");
        assert!(args.contains(&"--bundle".to_owned()));
        assert!(args.contains(&"--outfile=/tmp/out.js".to_owned()));
        assert!(args.contains(&"--metafile=/tmp/meta.json".to_owned()));
        assert!(args.contains(&"--define:process.env.NODE_ENV=\"production\"".to_owned()));
        assert!(args.contains(&"--define:__DEV__=false".to_owned()));
        assert!(args.contains(&"--loader:.png=file".to_owned()));
        assert!(args.contains(&"--minify".to_owned()));
    }

    #[test]
    fn test_development_args() {
        let cache = TempDir::new().unwrap();
        let server = server(&cache, false);
        let args = server.esbuild_args(
            &request(true, false),
            Path::new("out.js"),
            Path::new("meta.json"),
        );

        assert!(args.contains(&"--define:process.env.NODE_ENV=\"development\"".to_owned()));
        assert!(args.contains(&"--define:__DEV__=true".to_owned()));
        assert!(!args.contains(&"--minify".to_owned()));
    }

    #[test]
    fn test_resolve_extensions_prefer_platform() {
        let cache = TempDir::new().unwrap();
        let server = server(&cache, false);
        let extensions = server.resolve_extensions("ios");
        assert!(extensions.starts_with(".ios.js,.native.js,.js,.ios.jsx,"));
        assert!(extensions.ends_with(".ios.json,.native.json,.json"));
    }

    #[test]
    fn test_reset_cache_removes_stale_builds() {
        let cache = TempDir::new().unwrap();
        let stale = cache.path().join("build-stale");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("bundle-1.js"), "old").unwrap();

        let kept = server(&cache, false);
        assert!(stale.exists());
        drop(kept);

        let mut fresh = server(&cache, true);
        assert!(!stale.exists());
        fresh.end();
    }

    #[test]
    fn test_reset_cache_keeps_foreign_files() {
        // A cache dir pointing at the project root must not lose the project
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("index.js"), "export {};").unwrap();
        fs::create_dir_all(project.path().join("src")).unwrap();
        fs::write(project.path().join("src").join("app.js"), "").unwrap();
        fs::create_dir_all(project.path().join("build-old")).unwrap();

        let file: crate::config::ConfigFile = toml::from_str("cache-dir = \".\"").unwrap();
        let mut config = Config::from_file(project.path(), file).unwrap();
        config.reset_cache = true;
        let mut server = EsbuildServer::with_executable(&config, PathBuf::from("/bin/true")).unwrap();

        assert!(project.path().join("index.js").is_file());
        assert!(project.path().join("src").join("app.js").is_file());
        assert!(!project.path().join("build-old").exists());
        server.end();
        assert!(project.path().join("index.js").is_file());
    }

    #[test]
    fn test_end_removes_staging_and_is_idempotent() {
        let cache = TempDir::new().unwrap();
        let mut server = server(&cache, false);
        let staging = server.staging_dir().unwrap();
        assert!(staging.is_dir());

        server.end();
        server.end();

        assert!(!staging.exists());
        assert!(server.build(&request(true, false)).is_err());
    }

    #[test]
    #[cfg(not(windows))]
    fn test_absolutize_sources() {
        let map = r#"{"version":3,"sources":["../src/a.js","/abs/b.js"],"mappings":""}"#;
        let rewritten = absolutize_sources(map, Path::new("/project/staging")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(
            value["sources"],
            serde_json::json!(["/project/src/a.js", "/abs/b.js"])
        );
    }

    #[test]
    fn test_locate_esbuild_relative_path() {
        let root = TempDir::new().unwrap();
        let bin = root.path().join("node_modules").join(".bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("esbuild"), "").unwrap();

        assert_eq!(
            locate_esbuild(root.path(), "node_modules/.bin/esbuild").unwrap(),
            root.path().join("node_modules/.bin/esbuild")
        );
        assert!(locate_esbuild(root.path(), "node_modules/.bin/missing").is_err());
    }
}
