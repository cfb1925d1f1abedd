use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

mod cli;
mod cmd_profiles;
mod cmd_serve;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт — info.
    // Пример: RUST_LOG=debug veggie serve ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Serve {
            addr,
            profile_dir,
            services,
            index_profiles,
        } => cmd_serve::exec(addr, profile_dir, services, index_profiles),

        cli::Cmd::Profiles(cli::ProfilesCmd::List { profile_dir, json }) => {
            cmd_profiles::exec_list(profile_dir, json)
        }

        cli::Cmd::Profiles(cli::ProfilesCmd::Show { name, profile_dir }) => {
            cmd_profiles::exec_show(name, profile_dir)
        }
    }
}
