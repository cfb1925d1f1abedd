use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// veggie — mock-service state engine (overrides, profiles)
#[derive(Parser, Debug)]
#[command(name = "veggie", version, about = "Mock service server with runtime overrides and profiles")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Serve the admin API and the mocked services
    ///
    /// Пример:
    ///   veggie serve --addr 127.0.0.1:1337 --services ./services.json --index-profiles
    Serve {
        /// Listen address (overrides VEGGIE_ADDR)
        #[arg(long)]
        addr: Option<String>,
        /// Profile directory (overrides VEGGIE_PROFILE_DIR)
        #[arg(long)]
        profile_dir: Option<PathBuf>,
        /// JSON array of service descriptors to seed the store with
        #[arg(long)]
        services: Option<PathBuf>,
        /// Register every profile file found in the profile directory
        #[arg(long, default_value_t = false)]
        index_profiles: bool,
    },
    /// Inspect profile files on disk
    #[command(subcommand)]
    Profiles(ProfilesCmd),
}

#[derive(Subcommand, Debug)]
pub enum ProfilesCmd {
    /// List profile names (file stems)
    List {
        #[arg(long)]
        profile_dir: Option<PathBuf>,
        /// JSON output
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print one profile's override map
    Show {
        /// Profile name or path to a .json file
        name: String,
        #[arg(long)]
        profile_dir: Option<PathBuf>,
    },
}
