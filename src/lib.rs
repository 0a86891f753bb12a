//! # methseg
//!
//! `methseg` segments read-level nanopore methylation calls of several
//! samples jointly. For every chromosome (or window of one) it finds
//! contiguous regions where each sample has a homogeneous methylation rate,
//! so that differences between samples show up as segment boundaries.
//!
//! ## Key Features
//!
//! * **Joint HMM segmentation**: ordered hidden states with one Bernoulli
//!   methylation rate per sample ([`BernoulliPosterior`]), trained with
//!   Baum-Welch on scaled forward/backward recursions and decoded per
//!   position ([`SegmentationHmm`]).
//! * **Segment cleanup**: adjacent segments whose per-sample rates differ by
//!   less than a threshold are merged until a fixed point is reached.
//! * **Parallel driver**: readers and workers connected by bounded channels
//!   ([`SegmentationPipeline`]) process chromosomes or windows independently;
//!   failed units are reported, never silently dropped.
//! * **TSV I/O**: a call table store ([`TsvCallStore`]) and a segment
//!   writer ([`SegmentWriter`]).
//!
//! Number of worker threads can be configured with the `METHSEG_NUM_THREADS`
//! environment variable.
//!
//! ## Structure
//!
//! * [`data_structs`]: sparse call matrices, task units, failure records and
//!   segment calls.
//! * [`io`]: the [`CallStore`] and [`SegmentSink`] boundaries and their
//!   implementations.
//! * [`tools`]: the segmentation engine and the parallel pipeline.
//! * [`utils`]: thread defaults, probability helpers and builder macros.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use methseg::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = TsvCallStore::from_path("calls.tsv")?;
//!     let units = store.task_units(Some(2000))?;
//!     let mut writer = SegmentWriter::from_path("segments.tsv")?;
//!
//!     let pipeline = SegmentationPipeline::new(
//!         SegmentationConfig::default().with_max_segments(16),
//!         PipelineConfig::default(),
//!     );
//!     let report = pipeline.run(Arc::new(store), units, &mut writer)?;
//!     writer.flush()?;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```
//!
//! [`BernoulliPosterior`]: tools::segment::BernoulliPosterior
//! [`SegmentationHmm`]: tools::segment::SegmentationHmm
//! [`SegmentationPipeline`]: tools::pool::SegmentationPipeline
//! [`TsvCallStore`]: io::TsvCallStore
//! [`SegmentWriter`]: io::SegmentWriter
//! [`CallStore`]: io::CallStore
//! [`SegmentSink`]: io::SegmentSink

pub mod data_structs;
pub mod error;
pub mod io;
pub mod prelude;
pub mod tools;
pub mod utils;
