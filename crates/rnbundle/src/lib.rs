pub mod args;
pub mod assets;
pub mod combine;
pub mod config;
pub mod context;
pub mod dirs;
pub mod orchestrator;
pub mod output;
pub mod package_path;
pub mod server;

pub use config::Config;
pub use orchestrator::build_bundle;
