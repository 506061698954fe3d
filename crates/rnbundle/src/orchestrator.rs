use ansi_term::Colour;
use anyhow::{Result, bail};
use log::{debug, info};

use crate::args::BundleArgs;
use crate::assets::{AssetSaveSummary, save_assets};
use crate::config::{Config, LoadOptions};
use crate::context::Context;
use crate::output::BundleOutput;
use crate::server::{
    BundleOptions, BundleType, BundlerServer, EsbuildServer, RequestOptions, ServerGuard,
};

/// Build the bundle described by `args` with the esbuild server, write it through `output` and
/// copy its assets.
pub fn build_bundle(
    args: &BundleArgs,
    ctx: &Context,
    output: &dyn BundleOutput,
) -> Result<AssetSaveSummary> {
    build_bundle_with(args, ctx, output, EsbuildServer::new)
}

/// Same as [`build_bundle`] with the server created by `start_server` from the loaded config.
///
/// Nothing is written and no server is started unless the platform is valid. Once started,
/// the server is ended exactly once, whichever step fails.
pub fn build_bundle_with<S, F>(
    args: &BundleArgs,
    ctx: &Context,
    output: &dyn BundleOutput,
    start_server: F,
) -> Result<AssetSaveSummary>
where
    S: BundlerServer,
    F: FnOnce(&Config) -> Result<S>,
{
    let config = Config::load(
        ctx,
        &LoadOptions {
            reset_cache: args.reset_cache,
            config: args.config.as_deref(),
        },
    )?;

    if !config.supports_platform(&args.platform) {
        report_invalid_platform(&args.platform, &config.resolver.platforms);
        bail!("Invalid platform selected.");
    }

    let request = request_options(args);
    debug!("Request options: {:?}", request);
    info!(
        "Building {} bundle for {} from {:?}",
        request.mode().node_env(),
        request.platform,
        request.entry_file
    );

    let mut server = ServerGuard::new(start_server(&config)?);

    let bundle = output.build(&mut *server, &request)?;
    output.save(&bundle, args, &|message: &str| info!("{}", message))?;

    let assets = server.get_assets(&BundleOptions::merged(&request, BundleType::Assets))?;
    save_assets(&assets, &args.platform, args.assets_dest.as_deref())
}

#[allow(clippy::print_stderr)]
fn report_invalid_platform(platform: &str, platforms: &[String]) {
    eprintln!(
        "{}",
        Colour::Red.paint(invalid_platform_message(platform, platforms))
    );
}

/// The diagnostic shown when `--platform` is not one of the configured platforms.
pub fn invalid_platform_message(platform: &str, platforms: &[String]) -> String {
    [
        format!("Invalid platform ({platform}) selected."),
        "Available platforms are:".to_owned(),
        platforms.join(", "),
        "If you are trying to bundle for an out-of-tree platform, it may not be installed."
            .to_owned(),
    ]
    .join("\n")
}

/// `sourceMappingURL` for the bundle: the file name of `--sourcemap-output`, or the path as
/// given with `--sourcemap-use-absolute-path`.
pub fn source_map_url(args: &BundleArgs) -> Option<String> {
    let sourcemap_output = args.sourcemap_output.as_ref()?;
    if args.sourcemap_use_absolute_path {
        Some(sourcemap_output.to_string_lossy().into_owned())
    } else {
        sourcemap_output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

pub fn request_options(args: &BundleArgs) -> RequestOptions {
    RequestOptions {
        entry_file: args.entry_file.clone(),
        source_map_url: source_map_url(args),
        dev: args.dev,
        minify: args.minify.unwrap_or(!args.dev),
        platform: args.platform.clone(),
    }
}
