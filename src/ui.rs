// UI layer: interactive menu using `dialoguer` and a single status line
// rendered with an `indicatif` spinner. Progress messages go to the status
// line; results go to the log.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use dialoguer::{Password, Select};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::ApiClient;
use crate::config::Settings;
use crate::files::TokenStore;
use crate::orchestrator::{Orchestrator, PassSummary};
use crate::retry::ThreadSleeper;
use crate::runner::TaskPlan;

/// A single, rewritable progress line.
pub trait StatusLine {
    /// Show `message`, replacing whatever the line currently says.
    fn show(&mut self, message: &str);
    fn clear(&mut self);
}

/// Discards status updates.
pub struct SilentStatus;

impl StatusLine for SilentStatus {
    fn show(&mut self, _message: &str) {}
    fn clear(&mut self) {}
}

/// Spinner-backed status line. The spinner is created on first use and
/// reused until `clear`.
#[derive(Default)]
pub struct SpinnerStatus {
    bar: Option<ProgressBar>,
}

impl StatusLine for SpinnerStatus {
    fn show(&mut self, message: &str) {
        let bar = self.bar.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        bar.set_message(message.to_string());
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Main interactive menu. Runs until the user picks "Exit" or starts the
/// daily loop, which does not return.
pub fn main_menu(settings: &Settings, proxies: Vec<String>) -> Result<()> {
    loop {
        let items = vec!["Run daily tasks", "Add token", "Exit"];
        let selection = Select::new().with_prompt("Select mode").items(&items).default(0).interact()?;
        match selection {
            0 => {
                let token_file = pick_token_file(settings)?;
                log::info!("Loading tokens from {}", token_file.display());
                run_daily_tasks(settings, proxies, &token_file, None);
                return Ok(());
            }
            1 => handle_add_token(settings)?,
            2 => break,
            _ => {}
        }
    }
    Ok(())
}

fn pick_token_file(settings: &Settings) -> Result<PathBuf> {
    let files = &settings.files.token_files;
    if files.len() <= 1 {
        return Ok(files.first().cloned().unwrap_or_else(|| PathBuf::from("token.txt")));
    }
    let names: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
    let idx = Select::new().with_prompt("Select token file").items(&names).default(0).interact()?;
    Ok(files[idx].clone())
}

/// Ask for a session token and append it to a token file.
fn handle_add_token(settings: &Settings) -> Result<()> {
    let store = TokenStore::new(pick_token_file(settings)?);
    // `Password` hides the token while typing.
    let token: String = Password::new().with_prompt("Session token").interact()?;
    match store.append(&token) {
        Ok(()) => println!("Token added to {}", store.path().display()),
        Err(e) => println!("Could not add token: {:#}", e),
    }
    Ok(())
}

/// Run passes over `token_file`: forever, or `max_passes` times.
pub fn run_daily_tasks(settings: &Settings, proxies: Vec<String>, token_file: &Path, max_passes: Option<usize>) -> Vec<PassSummary> {
    let plan = TaskPlan {
        upload_count: settings.schedule.upload_count,
        upload_pause: settings.schedule.upload_pause(),
    };
    let sleeper = ThreadSleeper;
    let orchestrator = Orchestrator::new(proxies, plan, settings.schedule.pass_interval(), &sleeper);
    let policy = settings.retry.policy();
    let mut status = SpinnerStatus::default();
    orchestrator.run_cycles(
        token_file,
        max_passes,
        |token, choice| ApiClient::connect(&settings.api, policy, Some(token), choice),
        &mut status,
    )
}
