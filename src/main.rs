// Entrypoint for the CLI application.
// - Loads settings and the proxy list once, then either runs straight away
//   (`--tokens`) or shows the interactive menu.

use std::path::PathBuf;

use clap::Parser;
use taskbot::{config, files, ui};

#[derive(Parser, Debug)]
#[command(version, about = "Daily account task runner")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Token file to run; skips the menu
    #[arg(short, long)]
    tokens: Option<PathBuf>,

    /// Run a single pass and exit instead of repeating daily
    #[arg(long)]
    once: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config);
    let settings = config::load_settings(&config_path)?;
    let proxies = files::read_proxies(&settings.files.proxies);

    let max_passes = args.once.then_some(1);
    match args.tokens {
        Some(token_file) => {
            ui::run_daily_tasks(&settings, proxies, &token_file, max_passes);
        }
        None if args.once => {
            let token_file = settings.files.token_files.first().cloned().unwrap_or_else(|| PathBuf::from("token.txt"));
            ui::run_daily_tasks(&settings, proxies, &token_file, max_passes);
        }
        None => ui::main_menu(&settings, proxies)?,
    }
    Ok(())
}
