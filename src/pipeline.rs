use crate::{
    config::RunConfig,
    discovery::Discovery,
    error::DiscoveryError,
    monitor::{MemoryStatus, ResourceMonitor},
    registry::Registry,
    report::{self, Report},
    scheduler::{CancelFlag, ProgressObserver, Scheduler},
};
use std::time::{Duration, Instant};
use tracing::{Span, info, info_span};

/// Discovery → scheduler → report for one input tree.
pub struct Pipeline {
    cfg: RunConfig,
    registry: Registry,
    span: Span,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    pub rendered: String,
    pub discovered: usize,
    pub abandoned: usize,
    pub memory_before: MemoryStatus,
    pub memory_after: MemoryStatus,
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Whether the caller should exit successfully. Failures only count when
    /// `skip_on_error` is off.
    pub fn exit_ok(&self, skip_on_error: bool) -> bool {
        skip_on_error || !self.report.has_failures()
    }
}

impl Pipeline {
    pub fn new(cfg: &RunConfig, registry: Registry, span: Span) -> Self {
        Self {
            cfg: cfg.clone(),
            registry,
            span,
        }
    }

    pub fn run(
        &self,
        observer: Option<&dyn ProgressObserver>,
        cancel: Option<CancelFlag>,
    ) -> Result<RunOutcome, DiscoveryError> {
        let started = Instant::now();

        let discovery = Discovery::new(&self.registry, info_span!(parent: &self.span, "discovery"))
            .with_output_extension(&self.cfg.output_extension);
        let tasks = discovery.discover(
            &self.cfg.input_folder,
            &self.cfg.output_folder,
            self.cfg.overwrite_existing,
        )?;
        let discovered = tasks.len();

        let monitor = ResourceMonitor::new(
            self.cfg.memory_ceiling_bytes,
            info_span!(parent: &self.span, "monitor"),
        );
        let memory_before = monitor.status_snapshot();

        let mut scheduler = Scheduler::new(
            &self.registry,
            self.cfg.concurrency,
            info_span!(parent: &self.span, "scheduler"),
        )
        .with_degraded_policy(self.cfg.degraded_policy)
        .with_postprocess(self.cfg.postprocess.clone());
        if self.cfg.admission_control {
            scheduler = scheduler.with_admission_control(&monitor);
        }
        if let Some(observer) = observer {
            scheduler = scheduler.with_observer(observer);
        }
        if let Some(cancel) = cancel {
            scheduler = scheduler.with_cancel_flag(cancel);
        }

        let batch = scheduler.run(tasks);
        let memory_after = monitor.status_snapshot();

        let report = report::aggregate(batch.results);
        let rendered = report::render(&report);
        let elapsed = started.elapsed();

        info!(
            parent: &self.span,
            event = "batch_summary",
            total = report.total(),
            successful = report.successful.len(),
            failed = report.failed.len(),
            abandoned = batch.abandoned,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch finished: {} ok, {} failed in {:.2}s",
            report.successful.len(),
            report.failed.len(),
            elapsed.as_secs_f64()
        );

        Ok(RunOutcome {
            report,
            rendered,
            discovered,
            abandoned: batch.abandoned,
            memory_before,
            memory_after,
            elapsed,
        })
    }
}
