use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(name = "campusd", version, about = "Student records, attendance, fees and results sidecar")]
pub struct Config {
    /// Workspace directory to open at start-up. `workspace.select` can switch it later.
    #[arg(long, env = "CAMPUSD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Default tracing filter when RUST_LOG is unset.
    #[arg(long, env = "CAMPUSD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
