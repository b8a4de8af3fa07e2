//! One fetch → decode → build pass, and a fixed-interval poll loop around it.

use std::time::Duration;

use anyhow::Result;
use tracing::{Instrument, error, info, warn};

use crate::directory::StopDirectory;
use crate::fetch::{FeedSource, HttpClient, fetch_source};
use crate::output::{OutputSink, Report};
use crate::parser::decode_entities;
use crate::snapshot::SnapshotBuilder;
use crate::timestamp::TimeFormatter;

/// Everything a snapshot run depends on. The stop table is loaded once by the
/// caller and only read from here.
pub struct SnapshotJob<C> {
    client: C,
    source: FeedSource,
    directory: StopDirectory,
    formatter: TimeFormatter,
}

impl<C: HttpClient> SnapshotJob<C> {
    pub fn new(
        client: C,
        source: FeedSource,
        directory: StopDirectory,
        formatter: TimeFormatter,
    ) -> Self {
        Self {
            client,
            source,
            directory,
            formatter,
        }
    }

    pub fn directory(&self) -> &StopDirectory {
        &self.directory
    }

    /// Produces one report. Fetch and decode failures become error reports.
    #[tracing::instrument(skip(self), fields(source = %self.source))]
    pub async fn run_once(&self) -> Report {
        let bytes = match fetch_source(&self.client, &self.source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, status = ?e.status_code(), "Feed fetch failed");
                return e.into();
            }
        };

        let entities = match decode_entities(&bytes) {
            Ok(entities) => entities,
            Err(e) => {
                error!(error = %e, "Feed decode failed");
                return e.into();
            }
        };

        let snapshot = SnapshotBuilder::new(&self.directory, self.formatter).build(&entities);
        info!(trips = snapshot.trips.len(), "Snapshot ready");
        snapshot.into()
    }

    /// Runs once and writes the result to `sink`.
    pub async fn run(&self, sink: &OutputSink, pretty: bool) -> Result<Report> {
        let report = self.run_once().await;
        sink.write(&report, pretty)?;
        Ok(report)
    }

    /// Writes a fresh report every `period` until Ctrl-C. Cycles share
    /// nothing but the stop table.
    pub async fn poll(&self, sink: &OutputSink, pretty: bool, period: Duration) -> Result<()> {
        self.poll_until(sink, pretty, period, tokio::signal::ctrl_c())
            .await
    }

    /// Polls until `shutdown` resolves, including while a cycle is in flight.
    pub async fn poll_until<F>(
        &self,
        sink: &OutputSink,
        pretty: bool,
        period: Duration,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut cycle = 0u64;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => {
                    info!(cycles = cycle, "Interrupted, stopping poll loop");
                    return Ok(());
                }
            }

            cycle += 1;
            let span = tracing::info_span!("poll_cycle", cycle);
            tokio::select! {
                res = self.run(sink, pretty).instrument(span) => {
                    if let Err(e) = res {
                        warn!(error = %e, cycle, "Could not write report");
                    }
                }
                _ = &mut shutdown => {
                    info!(cycles = cycle, "Interrupted during a cycle, stopping poll loop");
                    return Ok(());
                }
            }
        }
    }
}
