//! One polling pass over one region.
//!
//! ```text
//! Idle → Scanning → Selecting → Reporting → Done
//!            │            │
//!            └─ no items ─┴──────────────→ Done
//! ```
//!
//! A scan failure counts as "no candidates". A watermark that cannot be read
//! ends the region without reporting anything, since every candidate would
//! otherwise look new.

use crate::api::Classifier;
use crate::error::WatermarkError;
use crate::models::CandidateItem;
use crate::outputs::Notifier;
use crate::pipeline::{ItemOutcome, ReportPipeline};
use crate::regions::RegionConfig;
use crate::scrapers::{ArticleFetcher, RegionScanner};
use crate::selector::select_new;
use crate::watermark::WatermarkStore;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Region run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    Selecting,
    Reporting,
    Done,
}

/// Whether new items are reported or only recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Report,
    /// Record every new item as seen without delivering it.
    Seed,
}

/// Summary of one region run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionReport {
    pub region: &'static str,
    pub candidates: usize,
    pub selected: usize,
    pub outcomes: Vec<(String, ItemOutcome)>,
}

impl RegionReport {
    fn empty(region: &RegionConfig) -> Self {
        Self {
            region: region.name(),
            candidates: 0,
            selected: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn recorded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_recorded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.recorded()
    }
}

/// Orchestrates scanning, selection and reporting for a region.
pub struct RegionRunner<'a, S, F, C, N, W> {
    pub scanner: &'a S,
    pub pipeline: ReportPipeline<'a, F, C, N, W>,
    pub mode: RunMode,
}

impl<'a, S, F, C, N, W> RegionRunner<'a, S, F, C, N, W>
where
    S: RegionScanner,
    F: ArticleFetcher,
    C: Classifier,
    N: Notifier,
    W: WatermarkStore,
{
    #[instrument(level = "info", skip_all, fields(region = %region.name()))]
    pub async fn run(&self, region: &RegionConfig) -> Result<RegionReport, WatermarkError> {
        let mut report = RegionReport::empty(region);
        let mut state = RunState::Idle;

        transition(&mut state, RunState::Scanning);
        let candidates = scan_or_empty(self.scanner, region).await;
        report.candidates = candidates.len();
        if candidates.is_empty() {
            transition(&mut state, RunState::Done);
            info!("No candidates this run");
            return Ok(report);
        }

        transition(&mut state, RunState::Selecting);
        let watermark = self.pipeline.store.load(region).await?;
        if watermark.is_empty() {
            info!("No watermark yet; every candidate is new");
        }
        let selected = select_new(&candidates, &watermark);
        report.selected = selected.len();
        debug!(
            known = watermark.len(),
            newest_known = ?watermark.ids().next(),
            selected = ?selected.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            "Selected new items"
        );
        if selected.is_empty() {
            transition(&mut state, RunState::Done);
            info!(candidates = report.candidates, "Nothing new");
            return Ok(report);
        }

        transition(&mut state, RunState::Reporting);
        report.outcomes = match self.mode {
            RunMode::Report => self.pipeline.report_all(region, &selected).await,
            RunMode::Seed => {
                let mut outcomes = Vec::with_capacity(selected.len());
                for item in &selected {
                    outcomes.push((item.id.clone(), self.pipeline.seed(region, item).await));
                }
                outcomes
            }
        };

        transition(&mut state, RunState::Done);
        info!(
            candidates = report.candidates,
            selected = report.selected,
            recorded = report.recorded(),
            failed = report.failed(),
            mode = ?self.mode,
            "Region run complete"
        );
        Ok(report)
    }

    /// Run `regions` one after another with `delay` between them.
    ///
    /// A region whose watermark cannot be read is logged and skipped; the
    /// regions after it still run. Returns the reports of the regions that ran.
    pub async fn run_regions(&self, regions: &[RegionConfig], delay: Duration) -> Vec<RegionReport> {
        let mut reports = Vec::with_capacity(regions.len());
        for (i, region) in regions.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                debug!(?delay, "Pausing between regions");
                sleep(delay).await;
            }
            match self.run(region).await {
                Ok(report) => {
                    for (id, outcome) in &report.outcomes {
                        debug!(region = report.region, %id, %outcome, "Item outcome");
                    }
                    reports.push(report);
                }
                Err(e) => {
                    error!(region = %region.name(), error = %e, "Watermark unavailable; region skipped");
                }
            }
        }
        reports
    }
}

/// Scan a region, folding a scan error into "no candidates".
async fn scan_or_empty<S: RegionScanner>(scanner: &S, region: &RegionConfig) -> Vec<CandidateItem> {
    match scanner.scan(region).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Scan failed; treating as no candidates");
            Vec::new()
        }
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = ?*state, to = ?next, "Region state");
    *state = next;
}
