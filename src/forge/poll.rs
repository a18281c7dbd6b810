//! Shared `waitForChecks` polling policy (spec §4.2 "Polling policy"):
//! exponential backoff capped at `poll_interval`, bounded by
//! `overall_timeout`, cancellable at every sleep boundary — the same
//! `tokio::select!`-against-a-timeout shape the teacher's own
//! `operations::push::core::push` uses to make a child-process wait
//! cancellable, generalized here to "stop polling and return."

use std::time::{Duration, Instant};

use super::adapter::{CheckState, ForgeAdapter, WaitOutcome};
use super::error::ForgeResult;
use crate::tools::context::CancellationToken;

pub struct WaitForChecksOpts<'a> {
    pub poll_interval: Duration,
    pub overall_timeout: Duration,
    pub required_set: Option<&'a [String]>,
}

pub async fn wait_for_checks(
    forge: &dyn ForgeAdapter,
    number: u64,
    opts: WaitForChecksOpts<'_>,
    cancel: &CancellationToken,
) -> ForgeResult<WaitOutcome> {
    let start = Instant::now();
    let mut backoff = Duration::from_secs(1).min(opts.poll_interval);

    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::TimedOut);
        }
        if start.elapsed() >= opts.overall_timeout {
            return Ok(WaitOutcome::TimedOut);
        }

        let pr = forge.get_pr_by_number(number).await?;
        let relevant: Vec<_> = match opts.required_set {
            Some(names) => pr
                .checks
                .iter()
                .filter(|c| names.iter().any(|n| n == &c.name))
                .collect(),
            None => pr.checks.iter().collect(),
        };

        let failed: Vec<String> = relevant
            .iter()
            .filter(|c| matches!(c.state, CheckState::Failure | CheckState::TimedOut))
            .map(|c| c.name.clone())
            .collect();
        if !failed.is_empty() {
            return Ok(WaitOutcome::Failed(failed));
        }

        let all_settled = relevant
            .iter()
            .all(|c| matches!(c.state, CheckState::Success | CheckState::Neutral));
        let have_required = match opts.required_set {
            Some(names) => names.len() <= relevant.len(),
            None => true,
        };
        // No relevant checks and nothing required means nothing to block
        // on: `all_settled`/`have_required` are both vacuously true over an
        // empty `relevant` set, and that's the correct call, not a reason to
        // keep polling until `overall_timeout`.
        if all_settled && have_required {
            return Ok(WaitOutcome::AllSucceeded);
        }

        let remaining = opts.overall_timeout.saturating_sub(start.elapsed());
        let sleep_for = backoff.min(remaining).min(opts.poll_interval);
        if sleep_for.is_zero() {
            return Ok(WaitOutcome::TimedOut);
        }

        tokio::select! {
            () = tokio::time::sleep(sleep_for) => {}
            () = cancel.cancelled() => return Ok(WaitOutcome::TimedOut),
        }
        backoff = (backoff * 2).min(opts.poll_interval);
    }
}
