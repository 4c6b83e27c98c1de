use anyhow::{bail, Context, Result};
use std::future::Future;
use std::io::Write;
use std::time::Duration;

use super::Session;
use crate::aggregator::{Aggregator, LoopSummary};
use crate::config::{Config, ConfigError};
use crate::feed::{FeedFetcher, FETCH_TIMEOUT};
use crate::util::{format_duration, parse_duration};

/// The polling interval from the command line, else from the config.
pub fn resolve_interval(arg: Option<&str>, config: &Config) -> Result<Duration> {
    if let Some(raw) = arg {
        return parse_duration(raw)
            .map_err(ConfigError::from)
            .with_context(|| format!("Invalid interval {raw:?}"));
    }
    match config.aggregation_interval()? {
        Some(interval) => Ok(interval),
        None => bail!(
            "No interval given. Run `gator agg <interval>` (e.g. 1m) or set aggregation_interval in the config."
        ),
    }
}

/// Collect feeds every `interval` until `shutdown` completes.
pub async fn agg<F>(
    session: &Session,
    interval: Option<&str>,
    shutdown: F,
    out: &mut impl Write,
) -> Result<LoopSummary>
where
    F: Future<Output = ()>,
{
    let interval = resolve_interval(interval, &session.config)?;
    let fetcher = FeedFetcher::new(session.config.user_agent(), FETCH_TIMEOUT)
        .context("Failed to build HTTP client")?;
    let aggregator = Aggregator::new(session.db.clone(), fetcher);

    writeln!(out, "Collecting feeds every {}", format_duration(interval))?;
    out.flush()?;

    let summary = aggregator.run_aggregation_loop(interval, shutdown).await;
    writeln!(
        out,
        "Stopped after {} cycle(s), {} failed",
        summary.cycles, summary.failures
    )?;
    Ok(summary)
}
