//! Assets referenced by a bundle and their on-disk layout per platform.
//!
//! An asset `img/logo.png` may come with scale variants (`logo@2x.png`, `logo@3x.png`) and
//! platform variants (`logo.ios.png`, `logo@2x.android.png`) in the same directory. All of them
//! are described by one [`AssetData`].

use anyhow::{Context, Result, anyhow};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use sugar_path::SugarPath;

const ANDROID_DRAWABLE_TYPES: &[&str] = &["gif", "jpeg", "jpg", "png", "svg", "webp", "xml"];

#[derive(Debug, Clone, PartialEq)]
pub struct AssetData {
    pub name: String,
    /// File extension, without the dot
    pub ty: String,
    /// URL directory the dev server would serve the asset from, e.g. `/assets/img`
    pub http_server_location: String,
    /// Ascending; `files[i]` holds the variant for `scales[i]`
    pub scales: Vec<f32>,
    pub files: Vec<PathBuf>,
}

impl AssetData {
    /// `http_server_location` without the leading slash.
    pub fn base_path(&self) -> &str {
        self.http_server_location
            .strip_prefix('/')
            .unwrap_or(&self.http_server_location)
    }
}

/// Result of [`save_assets`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetSaveSummary {
    /// Number of files copied
    pub copied: usize,
    /// Destination directory, `None` when saving was skipped
    pub dest: Option<PathBuf>,
}

/// An asset file name split into its parts.
#[derive(Debug, PartialEq)]
struct AssetFileName<'a> {
    name: &'a str,
    scale: f32,
    platform: Option<&'a str>,
    ty: &'a str,
}

impl<'a> AssetFileName<'a> {
    /// Parses `name[@<scale>x][.<platform>].<ext>`. Only configured platforms count as
    /// platform suffixes, so `icon.dark.png` is the asset `icon.dark`.
    fn parse(file_name: &'a str, platforms: &[String]) -> Option<Self> {
        let (stem, ty) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ty.is_empty() {
            return None;
        }

        let (stem, platform) = match stem.rsplit_once('.') {
            Some((rest, suffix)) if !rest.is_empty() && platforms.iter().any(|p| p == suffix) => {
                (rest, Some(suffix))
            }
            _ => (stem, None),
        };

        let (name, scale) = stem
            .rsplit_once('@')
            .and_then(|(name, suffix)| {
                let scale: f32 = suffix.strip_suffix('x')?.parse().ok()?;
                (!name.is_empty() && scale > 0.0).then_some((name, scale))
            })
            .unwrap_or((stem, 1.0));

        Some(Self {
            name,
            scale,
            platform,
            ty,
        })
    }
}

/// `/assets/<dir relative to root>`, with `..` components rendered as `__` so assets from
/// outside the project root stay inside the destination directory.
pub fn http_server_location(root: &Path, dir: &Path) -> String {
    let relative = dir.relative(root);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::ParentDir => Some("__".to_owned()),
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        "/assets".to_owned()
    } else {
        format!("/assets/{}", parts.join("/"))
    }
}

/// Group asset files referenced by a bundle into [`AssetData`], pulling in every scale variant
/// that exists next to them for `platform`.
pub fn collect_assets(
    root: &Path,
    files: &[PathBuf],
    platform: &str,
    platforms: &[String],
) -> Result<Vec<AssetData>> {
    let mut seen: IndexSet<(PathBuf, String, String)> = IndexSet::new();
    let mut assets = Vec::new();

    for file in files {
        let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
            warn!("Skipping asset with a non UTF-8 name: {:?}", file);
            continue;
        };
        let Some(parsed) = AssetFileName::parse(file_name, platforms) else {
            continue;
        };
        let dir = file.parent().unwrap_or(root).to_path_buf();
        let key = (dir.clone(), parsed.name.to_owned(), parsed.ty.to_owned());
        if !seen.insert(key) {
            continue;
        }

        // scale in thousandths -> (platform specific, file)
        let mut variants: BTreeMap<u32, (bool, PathBuf)> = BTreeMap::new();
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to read asset directory {:?}", dir))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to read asset directory {:?}", dir))?;
            let candidate_name = entry.file_name();
            let Some(candidate) = candidate_name
                .to_str()
                .and_then(|n| AssetFileName::parse(n, platforms))
            else {
                continue;
            };
            if candidate.name != parsed.name || candidate.ty != parsed.ty {
                continue;
            }
            let specific = match candidate.platform {
                Some(p) if p == platform => true,
                Some(_) => continue,
                None => false,
            };
            let key = (candidate.scale * 1000.0).round() as u32;
            match variants.get(&key) {
                Some((true, _)) => {}
                Some((false, _)) if !specific => {}
                _ => {
                    variants.insert(key, (specific, entry.path()));
                }
            }
        }

        if variants.is_empty() {
            warn!("Asset {:?} was not found on disk", file);
            continue;
        }

        let (scales, variant_files) = variants
            .into_iter()
            .map(|(scale, (_, path))| (scale as f32 / 1000.0, path))
            .unzip();
        let asset = AssetData {
            name: parsed.name.to_owned(),
            ty: parsed.ty.to_owned(),
            http_server_location: http_server_location(root, &dir),
            scales,
            files: variant_files,
        };
        debug!("Collected asset {}.{} at {:?}", asset.name, asset.ty, asset.scales);
        assets.push(asset);
    }

    Ok(assets)
}

fn android_density(scale: f32) -> Option<&'static str> {
    match (scale * 100.0).round() as u32 {
        75 => Some("ldpi"),
        100 => Some("mdpi"),
        150 => Some("hdpi"),
        200 => Some("xhdpi"),
        300 => Some("xxhdpi"),
        400 => Some("xxxhdpi"),
        _ => None,
    }
}

/// Android resource name: `img/logo` under `/assets` becomes `img_logo`.
pub fn android_resource_identifier(asset: &AssetData) -> String {
    let path = format!("{}/{}", asset.base_path(), asset.name).to_lowercase();
    let identifier: String = path
        .chars()
        .map(|c| if c == '/' { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();
    identifier
        .strip_prefix("assets_")
        .map_or_else(|| identifier.clone(), ToOwned::to_owned)
}

fn android_dest_path(asset: &AssetData, scale: f32) -> Result<PathBuf> {
    let folder = if ANDROID_DRAWABLE_TYPES.contains(&asset.ty.as_str()) {
        let density = android_density(scale).ok_or_else(|| {
            anyhow!(
                "Don't know which android drawable suffix to use for scale: {}\nAsset: {}",
                scale,
                asset.name
            )
        })?;
        format!("drawable-{density}")
    } else {
        "raw".to_owned()
    };
    Ok(PathBuf::from(folder).join(format!(
        "{}.{}",
        android_resource_identifier(asset),
        asset.ty
    )))
}

fn ios_dest_path(asset: &AssetData, scale: f32) -> PathBuf {
    let suffix = if (scale - 1.0).abs() < f32::EPSILON {
        String::new()
    } else {
        format!("@{scale}x")
    };
    let mut path = PathBuf::new();
    for part in asset.base_path().split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path.join(format!("{}{}.{}", asset.name, suffix, asset.ty))
}

/// Where each asset file goes under `dest` for `platform`.
pub fn asset_destinations(
    assets: &[AssetData],
    platform: &str,
    dest: &Path,
) -> Result<IndexMap<PathBuf, PathBuf>> {
    let mut copies = IndexMap::new();
    for asset in assets {
        for (scale, file) in asset.scales.iter().zip(&asset.files) {
            let relative = if platform == "android" {
                android_dest_path(asset, *scale)?
            } else {
                ios_dest_path(asset, *scale)
            };
            copies.insert(file.clone(), dest.join(relative));
        }
    }
    Ok(copies)
}

/// Copy `assets` into `dest` using the layout `platform` expects.
pub fn save_assets(
    assets: &[AssetData],
    platform: &str,
    dest: Option<&Path>,
) -> Result<AssetSaveSummary> {
    let Some(dest) = dest else {
        warn!("Assets destination folder is not set, skipping...");
        return Ok(AssetSaveSummary::default());
    };

    let copies = asset_destinations(assets, platform, dest)?;
    info!("Copying {} asset files", copies.len());
    for (src, dst) in &copies {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create asset directory {:?}", parent))?;
        }
        fs::copy(src, dst).with_context(|| format!("Failed to copy {:?} to {:?}", src, dst))?;
    }
    info!("Done copying assets");

    Ok(AssetSaveSummary {
        copied: copies.len(),
        dest: Some(dest.to_path_buf()),
    })
}
