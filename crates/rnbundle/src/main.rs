use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{debug, info};
use std::path::PathBuf;

use rnbundle::args::BundleArgs;
use rnbundle::context::Context;
use rnbundle::output::PlainBundle;
use rnbundle::package_path::{DEFAULT_PACKAGE, PackagePathResolver};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the bundle for the provided JavaScript entry file
    Bundle(BundleArgs),

    /// Print the path of a file inside the framework package, relative to the directory of
    /// this executable unless Yarn PnP resolves it
    PackagePath {
        /// Package to locate
        #[arg(long, default_value = DEFAULT_PACKAGE)]
        package: String,

        /// Path inside the package
        #[arg(default_value = "")]
        sub_path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    debug!(
        "Verbosity level: {} (log level: {})",
        cli.verbose, log_level
    );

    match cli.command {
        Command::Bundle(args) => {
            info!("Starting rnbundle");
            let ctx = Context::from_current_dir(DEFAULT_PACKAGE)?;
            debug!("Project root: {:?}", ctx.root);

            let summary = rnbundle::build_bundle(&args, &ctx, &PlainBundle)?;
            match summary.dest {
                Some(dest) => info!("Copied {} asset files to {:?}", summary.copied, dest),
                None => info!("Bundle created successfully at {:?}", args.bundle_output),
            }
        }
        Command::PackagePath { package, sub_path } => {
            let resolver = PackagePathResolver::new(&package);
            print_path(&resolver.resolve(&sub_path));
        }
    }

    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_path(path: &std::path::Path) {
    println!("{}", path.display());
}
