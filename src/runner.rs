// Account task sequence: status, check-in, N uploads, status again.
//
// Only the first status fetch is a hard gate: uuid and wallet come from it
// and every later step needs them. Everything after it logs and moves on.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use serde_json::Value;

use crate::api::{AccountApi, AccountStatus, ImageUpload};
use crate::retry::Sleeper;
use crate::ui::StatusLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPlan {
    pub upload_count: u32,
    pub upload_pause: Duration,
}

impl Default for TaskPlan {
    fn default() -> Self {
        TaskPlan {
            upload_count: 3,
            upload_pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckIn {
    Rewarded(Value),
    Rejected(Value),
    Failed(String),
}

/// What one run of the task sequence achieved.
#[derive(Debug, Clone)]
pub struct AccountReport {
    pub account: AccountStatus,
    pub ip: Option<String>,
    pub check_in: CheckIn,
    pub uploads_ok: u32,
    pub uploads_failed: u32,
    pub final_points: Option<Value>,
}

pub fn run_account(api: &dyn AccountApi, plan: &TaskPlan, sleeper: &dyn Sleeper, status: &mut dyn StatusLine) -> Result<AccountReport> {
    status.show("Fetching account status...");
    let fetched = api.status();
    status.clear();
    let account = fetched.context("Failed to fetch status")?;
    log::info!("Account status retrieved.");

    let ip = api.public_ip();
    log::info!(
        "USERNAME: {} | UUID: {} | WALLET: {} | IP: {}",
        account.username.as_deref().unwrap_or("N/A"),
        account.uuid,
        account.account,
        ip.as_deref().unwrap_or("unknown")
    );

    status.show("Performing checkin...");
    let check_in = match api.check_in() {
        Ok(res) if res.code == 200 => {
            log::info!("Checkin successful, reward: {}", res.data);
            CheckIn::Rewarded(res.data)
        }
        Ok(res) => {
            log::warn!("Checkin failed: {}", res.data);
            CheckIn::Rejected(res.data)
        }
        Err(e) => {
            log::error!("Checkin failed: {}", e);
            CheckIn::Failed(e.to_string())
        }
    };
    status.clear();

    let mut uploads_ok = 0;
    let mut uploads_failed = 0;
    for i in 1..=plan.upload_count {
        status.show(&format!("Uploading image {}/{}...", i, plan.upload_count));
        let result = upload_one(api, &account);
        status.clear();
        match result {
            Ok(()) => {
                log::info!("Image {}/{} uploaded successfully", i, plan.upload_count);
                uploads_ok += 1;
            }
            Err(e) => {
                log::error!("Image {}/{} upload failed: {:#}", i, plan.upload_count, e);
                uploads_failed += 1;
            }
        }
        sleeper.sleep(plan.upload_pause);
    }

    status.show("Fetching total points...");
    let final_points = match api.status() {
        Ok(s) => {
            log::info!("Total Points: {}", s.points);
            Some(s.points)
        }
        Err(e) => {
            log::error!("Failed to fetch points: {}", e);
            None
        }
    };
    status.clear();

    Ok(AccountReport {
        account,
        ip,
        check_in,
        uploads_ok,
        uploads_failed,
        final_points,
    })
}

fn upload_one(api: &dyn AccountApi, account: &AccountStatus) -> Result<()> {
    let seed: u32 = rand::thread_rng().gen_range(0..100_000);
    let bytes = api.fetch_image(seed).context("image fetch")?;
    let filename = format!("image_{}_{}.png", chrono::Utc::now().timestamp_millis(), seed);
    let res = api.upload(ImageUpload {
        bytes,
        filename,
        user_uuid: account.uuid.clone(),
        user_wallet: account.account.clone(),
    })?;
    if !res.is_ok() {
        anyhow::bail!("{}", serde_json::to_string(&res).unwrap_or_default());
    }
    Ok(())
}
