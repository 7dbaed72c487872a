// Pass loop: one account at a time, proxy chosen round-robin by index.

use std::path::Path;

use anyhow::Result;

use crate::api::AccountApi;
use crate::files;
use crate::proxy::{self, ProxyChoice};
use crate::retry::Sleeper;
use crate::runner::{run_account, TaskPlan};
use crate::ui::StatusLine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Drives passes over the token list. The proxy list is fixed at
/// construction and never changes afterwards.
pub struct Orchestrator<'a> {
    proxies: Vec<String>,
    plan: TaskPlan,
    pass_interval: std::time::Duration,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Orchestrator<'a> {
    pub fn new(proxies: Vec<String>, plan: TaskPlan, pass_interval: std::time::Duration, sleeper: &'a dyn Sleeper) -> Self {
        Orchestrator {
            proxies,
            plan,
            pass_interval,
            sleeper,
        }
    }

    /// Transport for the account at `index`.
    pub fn proxy_for(&self, index: usize) -> ProxyChoice {
        proxy::classify(proxy::assign(&self.proxies, index))
    }

    /// Run every token once. `connect` builds the API for a token over the
    /// given transport; a failure there counts as a failed account.
    pub fn run_pass<A, F>(&self, tokens: &[String], mut connect: F, status: &mut dyn StatusLine) -> PassSummary
    where
        A: AccountApi,
        F: FnMut(&str, &ProxyChoice) -> Result<A>,
    {
        let mut summary = PassSummary {
            total: tokens.len(),
            ..Default::default()
        };
        for (i, token) in tokens.iter().enumerate() {
            log::info!("[[ACCOUNT {}/{}]]", i + 1, tokens.len());
            let choice = self.proxy_for(i);
            log::info!("Transport: {}", choice.label());
            let outcome = connect(token.as_str(), &choice).and_then(|api| run_account(&api, &self.plan, self.sleeper, &mut *status));
            match outcome {
                Ok(_) => summary.completed += 1,
                Err(e) => {
                    log::error!("Error on account {}: {:#}", i + 1, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Re-read `token_file` and run a pass, then wait out the interval.
    /// Runs forever when `max_passes` is `None`; no wait follows the last pass.
    pub fn run_cycles<A, F>(&self, token_file: &Path, max_passes: Option<usize>, mut connect: F, status: &mut dyn StatusLine) -> Vec<PassSummary>
    where
        A: AccountApi,
        F: FnMut(&str, &ProxyChoice) -> Result<A>,
    {
        let mut summaries = Vec::new();
        loop {
            let tokens = files::read_tokens(token_file);
            let summary = if tokens.is_empty() {
                log::error!("No tokens found in {}. Skipping this cycle.", token_file.display());
                PassSummary::default()
            } else {
                self.run_pass(&tokens, &mut connect, status)
            };
            log::info!(
                "Cycle completed: {}/{} accounts ok, {} failed",
                summary.completed,
                summary.total,
                summary.failed
            );
            summaries.push(summary);
            if max_passes.is_some_and(|max| summaries.len() >= max) {
                return summaries;
            }
            log::info!("Waiting {:?} until the next cycle...", self.pass_interval);
            self.sleeper.sleep(self.pass_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::tests::RecordingSleeper;
    use crate::runner::tests::FakeApi;
    use crate::ui::SilentStatus;
    use std::time::Duration;

    fn orchestrator<'a>(proxies: &[&str], sleeper: &'a RecordingSleeper) -> Orchestrator<'a> {
        Orchestrator::new(
            proxies.iter().map(|p| p.to_string()).collect(),
            TaskPlan {
                upload_count: 1,
                upload_pause: Duration::from_millis(1),
            },
            Duration::from_secs(86_400),
            sleeper,
        )
    }

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn proxies_assigned_round_robin() {
        let sleeper = RecordingSleeper::default();
        let orch = orchestrator(&["http://p1:8080", "http://p2:8080"], &sleeper);
        let mut seen = Vec::new();
        let summary = orch.run_pass(
            &tokens(&["a", "b", "c"]),
            |token, choice| {
                seen.push((token.to_string(), choice.label()));
                Ok(FakeApi::default())
            },
            &mut SilentStatus,
        );
        assert_eq!(summary, PassSummary { total: 3, completed: 3, failed: 0 });
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), "http://p1:8080".to_string()),
                ("b".to_string(), "http://p2:8080".to_string()),
                ("c".to_string(), "http://p1:8080".to_string()),
            ]
        );
    }

    #[test]
    fn no_proxies_means_direct() {
        let sleeper = RecordingSleeper::default();
        let orch = orchestrator(&[], &sleeper);
        assert!(matches!(orch.proxy_for(0), ProxyChoice::Direct));
        assert!(matches!(orch.proxy_for(7), ProxyChoice::Direct));
    }

    #[test]
    fn unsupported_proxy_still_runs_account() {
        let sleeper = RecordingSleeper::default();
        let orch = orchestrator(&["ftp://nope:21"], &sleeper);
        let mut unsupported = 0;
        let summary = orch.run_pass(
            &tokens(&["a"]),
            |_, choice| {
                if let ProxyChoice::Unsupported { .. } = choice {
                    unsupported += 1;
                }
                assert!(choice.proxy().is_none());
                Ok(FakeApi::default())
            },
            &mut SilentStatus,
        );
        assert_eq!(unsupported, 1);
        assert_eq!(summary.completed, 1);
    }

    #[test]
    fn one_failing_account_does_not_stop_the_pass() {
        let sleeper = RecordingSleeper::default();
        let orch = orchestrator(&[], &sleeper);
        let summary = orch.run_pass(
            &tokens(&["bad", "good", "unreachable"]),
            |token, _| match token {
                "bad" => Ok(FakeApi {
                    fail_status: true,
                    ..Default::default()
                }),
                "unreachable" => anyhow::bail!("client build failed"),
                _ => Ok(FakeApi::default()),
            },
            &mut SilentStatus,
        );
        assert_eq!(summary, PassSummary { total: 3, completed: 1, failed: 2 });
    }

    #[test]
    fn cycles_reread_tokens_and_sleep_between_passes() {
        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("token.txt");
        std::fs::write(&token_file, "a\nb\n").unwrap();

        let sleeper = RecordingSleeper::default();
        let orch = orchestrator(&[], &sleeper);
        let mut pass = 0;
        let summaries = orch.run_cycles(
            &token_file,
            Some(2),
            |_, _| {
                pass += 1;
                if pass == 2 {
                    std::fs::write(&token_file, "a\nb\nc\n").unwrap();
                }
                Ok(FakeApi::default())
            },
            &mut SilentStatus,
        );
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].total, 2);
        assert_eq!(summaries[1].total, 3);
        let day = Duration::from_secs(86_400);
        assert_eq!(sleeper.slept.borrow().iter().filter(|d| **d == day).count(), 1);
    }

    #[test]
    fn missing_token_file_is_an_empty_pass() {
        let dir = tempfile::tempdir().unwrap();
        let sleeper = RecordingSleeper::default();
        let orch = orchestrator(&[], &sleeper);
        let summaries = orch.run_cycles(
            &dir.path().join("token.txt"),
            Some(1),
            |_, _| -> Result<FakeApi> { panic!("no account should run") },
            &mut SilentStatus,
        );
        assert_eq!(summaries, vec![PassSummary::default()]);
        assert!(sleeper.slept.borrow().is_empty());
    }
}
