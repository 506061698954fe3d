//! Output strategies: how a bundle is produced from a server and written to disk.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use sugar_path::SugarPath;

use crate::args::BundleArgs;
use crate::server::{Bundle, BundlerServer, RequestOptions};

pub trait BundleOutput {
    fn build(&self, server: &mut dyn BundlerServer, options: &RequestOptions) -> Result<Bundle>;

    /// Persist `bundle` where `args` asks for it, reporting progress through `log`.
    fn save(&self, bundle: &Bundle, args: &BundleArgs, log: &dyn Fn(&str)) -> Result<()>;
}

/// A single plain-JS bundle file plus an optional source map next to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainBundle;

impl BundleOutput for PlainBundle {
    fn build(&self, server: &mut dyn BundlerServer, options: &RequestOptions) -> Result<Bundle> {
        server.build(options)
    }

    fn save(&self, bundle: &Bundle, args: &BundleArgs, log: &dyn Fn(&str)) -> Result<()> {
        log(&format!(
            "Writing bundle output to: {}",
            args.bundle_output.display()
        ));
        write_file(
            &args.bundle_output,
            &args.bundle_encoding.encode(&bundle.code),
        )?;
        log("Done writing bundle output");

        if let (Some(sourcemap_output), Some(map)) = (&args.sourcemap_output, &bundle.map) {
            log(&format!(
                "Writing sourcemap output to: {}",
                sourcemap_output.display()
            ));
            let map = match &args.sourcemap_sources_root {
                Some(root) => relativize_sources(map, root)?,
                None => map.clone(),
            };
            write_file(sourcemap_output, map.as_bytes())?;
            log("Done writing sourcemap output");
        }

        Ok(())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}

/// Make every entry of a source map's `sources` relative to `root`, slash separated.
pub fn relativize_sources(map: &str, root: &Path) -> Result<String> {
    let mut value: serde_json::Value =
        serde_json::from_str(map).context("Failed to parse source map")?;

    if let Some(serde_json::Value::Array(sources)) = value.get_mut("sources") {
        for source in sources {
            if let serde_json::Value::String(path) = source {
                *path = Path::new(path.as_str())
                    .relative(root)
                    .to_slash_lossy()
                    .into_owned();
            }
        }
    }

    serde_json::to_string(&value).context("Failed to serialize source map")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::BundleEncoding;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn bundle() -> Bundle {
        Bundle {
            code: "console.log(1);\n//# sourceMappingURL=main.map\n".to_owned(),
            map: Some(r#"{"version":3,"sources":["/project/src/index.js"],"mappings":"AAAA"}"#.to_owned()),
        }
    }

    #[test]
    #[cfg(not(windows))]
    fn test_save_bundle_and_map() -> Result<()> {
        let out = TempDir::new()?;
        let mut args = BundleArgs::new("index.js", out.path().join("dist").join("main.jsbundle"));
        args.sourcemap_output = Some(out.path().join("dist").join("main.map"));
        args.sourcemap_sources_root = Some("/project".into());

        let messages = RefCell::new(Vec::new());
        PlainBundle.save(&bundle(), &args, &|m: &str| messages.borrow_mut().push(m.to_owned()))?;

        assert_eq!(fs::read_to_string(&args.bundle_output)?, bundle().code);
        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.path().join("dist").join("main.map"))?)?;
        assert_eq!(map["sources"], serde_json::json!(["src/index.js"]));
        assert_eq!(map["mappings"], "AAAA");

        let messages = messages.into_inner();
        assert_eq!(messages.len(), 4);
        assert!(messages[0].starts_with("Writing bundle output to: "));
        assert_eq!(messages[1], "Done writing bundle output");
        assert_eq!(messages[3], "Done writing sourcemap output");
        Ok(())
    }

    #[test]
    fn test_map_is_skipped_without_sourcemap_output() -> Result<()> {
        let out = TempDir::new()?;
        let mut args = BundleArgs::new("index.js", out.path().join("main.jsbundle"));
        args.bundle_encoding = BundleEncoding::Utf16le;

        PlainBundle.save(&bundle(), &args, &|_: &str| {})?;

        let written = fs::read(&args.bundle_output)?;
        assert_eq!(written.len(), bundle().code.len() * 2);
        assert_eq!(fs::read_dir(out.path())?.count(), 1);
        Ok(())
    }
}
