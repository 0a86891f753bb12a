//! Parallel segmentation of many task units.
//!
//! Readers pull units from a shared work list and load their matrices from a
//! [`CallStore`], workers segment them, and the calling thread collects the
//! outcomes and releases whole chromosomes to a [`SegmentSink`] in work-list
//! order. Stages are connected by bounded `crossbeam` channels, so a slow
//! sink throttles the readers.
//!
//! Every unit produces either segment calls or a [`TaskFailure`]; one failed
//! unit never stops the others unless `fail_fast` is set. Panics inside a
//! reader or worker are caught and the unit is retried once before it is
//! recorded as crashed.

mod cancel;
mod collect;
mod config;

use std::any::Any;
use std::panic::{
    catch_unwind,
    AssertUnwindSafe,
};
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
pub use cancel::CancellationToken;
pub use collect::{
    reassemble,
    PipelineReport,
    UnitOutcome,
};
use collect::Collector;
pub use config::PipelineConfig;
use crossbeam::channel::{
    bounded,
    Receiver,
    Sender,
};
use log::{
    debug,
    error,
    info,
    warn,
};

use crate::data_structs::{
    FailureKind,
    SegmentCall,
    SparseCallMatrix,
    TaskFailure,
    TaskUnit,
};
use crate::io::{
    CallStore,
    SegmentSink,
};
use crate::tools::segment::{
    segment,
    SegmentationConfig,
};

type Loaded = (usize, Result<SparseCallMatrix, TaskFailure>);
type Computed = (usize, UnitOutcome);

#[derive(Debug, Clone, Default)]
pub struct SegmentationPipeline {
    segmentation: SegmentationConfig,
    pipeline:     PipelineConfig,
    cancel:       CancellationToken,
}

impl SegmentationPipeline {
    pub fn new(
        segmentation: SegmentationConfig,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            segmentation,
            pipeline,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally owned token, which lets the caller cancel the run.
    pub fn with_cancellation(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn segmentation_config(&self) -> &SegmentationConfig {
        &self.segmentation
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.pipeline
    }

    pub fn run(
        &self,
        store: Arc<dyn CallStore>,
        units: Vec<TaskUnit>,
        sink: &mut dyn SegmentSink,
    ) -> anyhow::Result<PipelineReport> {
        self.run_with_progress(store, units, sink, &mut |_| {})
    }

    /// Like [`run`](Self::run), `progress` receives the number of units
    /// released to the sink each time a chromosome is written.
    pub fn run_with_progress(
        &self,
        store: Arc<dyn CallStore>,
        units: Vec<TaskUnit>,
        sink: &mut dyn SegmentSink,
        progress: &mut dyn FnMut(usize),
    ) -> anyhow::Result<PipelineReport> {
        self.segmentation.validate()?;
        self.pipeline.validate()?;
        if units.is_empty() {
            warn!("No task units to process");
            return Ok(PipelineReport::default());
        }

        let units = Arc::new(units);
        let cursor = Arc::new(AtomicUsize::new(0));
        let (load_tx, load_rx) = bounded::<Loaded>(self.pipeline.queue_capacity);
        let (out_tx, out_rx) = bounded::<Computed>(self.pipeline.queue_capacity);
        debug!(
            "Starting pipeline: {} units, {} readers, {} workers",
            units.len(),
            self.pipeline.n_reader,
            self.pipeline.n_worker
        );

        let mut handles = Vec::new();
        for i in 0..self.pipeline.n_reader {
            handles.push(self.spawn_reader(
                i,
                store.clone(),
                units.clone(),
                cursor.clone(),
                load_tx.clone(),
            )?);
        }
        drop(load_tx);
        for i in 0..self.pipeline.n_worker {
            handles.push(self.spawn_worker(
                i,
                units.clone(),
                load_rx.clone(),
                out_tx.clone(),
            )?);
        }
        drop(load_rx);
        drop(out_tx);

        let mut collector = Collector::new(&units, self.segmentation.min_parameter_diff);
        let mut sink_error = None;
        for (idx, outcome) in out_rx.iter() {
            if let Err(failure) = &outcome {
                warn!("{}", failure);
            }
            collector.insert(idx, outcome);
            match collector.flush_ready(sink) {
                Ok(released) => progress(released),
                Err(e) => {
                    self.cancel.cancel();
                    sink_error = Some(e);
                    break;
                },
            }
        }
        drop(out_rx);

        for handle in handles {
            if handle.join().is_err() {
                error!("Pipeline thread terminated with a panic");
            }
        }
        if let Some(e) = sink_error {
            return Err(e.context("Failed to write segmentation output"));
        }

        collector.cancel_remaining();
        let released = collector
            .flush_ready(sink)
            .context("Failed to write segmentation output")?;
        progress(released);

        let report = collector.finish();
        info!(
            "Segmented {} units: {} segments, {} failed ({} cancelled)",
            units.len(),
            report.calls.len(),
            report.failures.len(),
            report.n_cancelled()
        );
        Ok(report)
    }

    fn spawn_reader(
        &self,
        id: usize,
        store: Arc<dyn CallStore>,
        units: Arc<Vec<TaskUnit>>,
        cursor: Arc<AtomicUsize>,
        sender: Sender<Loaded>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let cancel = self.cancel.clone();
        std::thread::Builder::new()
            .name(format!("methseg-reader-{}", id))
            .spawn(move || {
                while !cancel.is_cancelled() {
                    let idx = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(unit) = units.get(idx) else {
                        break;
                    };
                    let loaded = match retry_once(unit, "Reader", || store.load(unit)) {
                        Ok(Ok(matrix)) => Ok(matrix),
                        Ok(Err(e)) => {
                            Err(TaskFailure::new(
                                unit.clone(),
                                FailureKind::Store,
                                format!("{:#}", e),
                            ))
                        },
                        Err(message) => {
                            Err(TaskFailure::new(
                                unit.clone(),
                                FailureKind::Crashed,
                                message,
                            ))
                        },
                    };
                    if sender.send((idx, loaded)).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to spawn reader thread")
    }

    fn spawn_worker(
        &self,
        id: usize,
        units: Arc<Vec<TaskUnit>>,
        receiver: Receiver<Loaded>,
        sender: Sender<Computed>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let cancel = self.cancel.clone();
        let config = self.segmentation.clone();
        let fail_fast = self.pipeline.fail_fast;
        std::thread::Builder::new()
            .name(format!("methseg-worker-{}", id))
            .spawn(move || {
                for (idx, loaded) in receiver.iter() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let unit = &units[idx];
                    let outcome =
                        loaded.and_then(|matrix| segment_unit(unit, &matrix, &config));
                    if outcome.is_err() && fail_fast {
                        cancel.cancel();
                    }
                    if sender.send((idx, outcome)).is_err() {
                        break;
                    }
                }
            })
            .context("Failed to spawn worker thread")
    }
}

fn segment_unit(
    unit: &TaskUnit,
    matrix: &SparseCallMatrix,
    config: &SegmentationConfig,
) -> Result<Vec<SegmentCall>, TaskFailure> {
    match retry_once(unit, "Worker", || segment(matrix, config, unit.chrom())) {
        Ok(Ok(calls)) => Ok(calls),
        Ok(Err(e)) => {
            Err(TaskFailure::new(
                unit.clone(),
                FailureKind::from(&e),
                e.to_string(),
            ))
        },
        Err(message) => {
            Err(TaskFailure::new(
                unit.clone(),
                FailureKind::Crashed,
                message,
            ))
        },
    }
}

/// Runs `f`, retrying once if it panics. The second panic is returned as its
/// message.
fn retry_once<T>(
    unit: &TaskUnit,
    stage: &str,
    mut f: impl FnMut() -> T,
) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(&mut f)) {
        Ok(value) => Ok(value),
        Err(payload) => {
            warn!(
                "{} panicked on {}: {}. Retrying once",
                stage,
                unit,
                panic_message(payload.as_ref())
            );
            catch_unwind(AssertUnwindSafe(&mut f))
                .map_err(|payload| panic_message(payload.as_ref()))
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
