use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::ProgressBar;
use methseg::prelude::*;
use methseg::utils::n_threads;

use crate::utils::{
    init_pbar,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct SegmentArgs {
    #[arg(
        short,
        long,
        required = true,
        help = "Tab-separated call table with columns chromosome, position, \
                read_name, sample, llr."
    )]
    input:  PathBuf,
    #[arg(short, long, required = true, help = "Output segments TSV.")]
    output: PathBuf,
    #[arg(
        short,
        long,
        help = "Split chromosomes into windows of this many CpG positions. \
                Whole chromosomes are segmented if not set."
    )]
    window: Option<usize>,

    #[arg(
        long,
        default_value_t = n_threads(),
        help_heading = "PIPELINE ARGS",
        help = "Number of segmentation workers."
    )]
    workers:   usize,
    #[arg(
        long,
        default_value_t = 1,
        help_heading = "PIPELINE ARGS",
        help = "Number of reader threads."
    )]
    readers:   usize,
    #[arg(
        long,
        help_heading = "PIPELINE ARGS",
        help = "Capacity of the queues between readers, workers and the writer."
    )]
    queue:     Option<usize>,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "PIPELINE ARGS",
        help = "Stop at the first failed unit."
    )]
    fail_fast: bool,

    #[arg(
        long,
        help_heading = "SEGMENTATION ARGS",
        help = "JSON file with segmentation parameters. Flags below override it."
    )]
    config:           Option<PathBuf>,
    #[arg(
        short = 'k',
        long,
        help_heading = "SEGMENTATION ARGS",
        help = "Maximum number of segments per unit [default: 10]."
    )]
    max_segments:     Option<usize>,
    #[arg(
        long,
        help_heading = "SEGMENTATION ARGS",
        help = "Weight of staying in the same state [default: 0.1]."
    )]
    t_stay:           Option<f64>,
    #[arg(
        long,
        help_heading = "SEGMENTATION ARGS",
        help = "Weight of moving to a neighbouring state [default: 0.8]."
    )]
    t_move:           Option<f64>,
    #[arg(
        long,
        help_heading = "SEGMENTATION ARGS",
        help = "Share of moves going to the next state rather than the previous \
                one [default: 1.0]."
    )]
    forward_fraction: Option<f64>,
    #[arg(
        long,
        help_heading = "SEGMENTATION ARGS",
        help = "Adjacent segments with all sample rates closer than this are \
                merged [default: 0.2]."
    )]
    min_diff:         Option<f64>,
    #[arg(
        long,
        help_heading = "SEGMENTATION ARGS",
        help = "Segments spanning fewer CpG positions are folded into their \
                closer neighbour [default: 3]."
    )]
    min_positions:    Option<usize>,
    #[arg(
        long,
        help_heading = "SEGMENTATION ARGS",
        help = "Maximum number of Baum-Welch iterations [default: 100]."
    )]
    max_iter:         Option<usize>,
}

impl SegmentArgs {
    fn segmentation_config(&self) -> anyhow::Result<SegmentationConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path).with_context(|| {
                    format!("Failed to open config {}", path.display())
                })?;
                SegmentationConfig::from_json(file)?
            },
            None => SegmentationConfig::default(),
        };
        if let Some(value) = self.max_segments {
            config = config.with_max_segments(value);
        }
        if let Some(value) = self.t_stay {
            config = config.with_t_stay(value);
        }
        if let Some(value) = self.t_move {
            config = config.with_t_move(value);
        }
        if let Some(value) = self.forward_fraction {
            config = config.with_forward_fraction(value);
        }
        if let Some(value) = self.min_diff {
            config = config.with_min_parameter_diff(value);
        }
        if let Some(value) = self.min_positions {
            config = config.with_min_segment_positions(value);
        }
        if let Some(value) = self.max_iter {
            config = config.with_max_iterations(value);
        }
        config.validate()?;
        Ok(config)
    }

    fn pipeline_config(&self) -> PipelineConfig {
        let config = PipelineConfig::default()
            .with_n_worker(self.workers)
            .with_n_reader(self.readers)
            .with_fail_fast(self.fail_fast);
        match self.queue {
            Some(queue) => config.with_queue_capacity(queue),
            None => config.with_queue_capacity(self.workers * 2),
        }
    }

    /// Returns whether every unit was segmented.
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<bool> {
        let segmentation = self.segmentation_config()?;
        let pipeline = self.pipeline_config();
        pipeline.validate()?;

        let store = TsvCallStore::from_path(&self.input)?;
        let units = store.task_units(self.window)?;
        let mut writer = SegmentWriter::from_path(&self.output)?;

        let progress_bar = if utils.progress {
            init_pbar(units.len())?
        }
        else {
            ProgressBar::hidden()
        };

        let report = SegmentationPipeline::new(segmentation, pipeline).run_with_progress(
            Arc::new(store),
            units,
            &mut writer,
            &mut |released| progress_bar.inc(released as u64),
        )?;
        writer.flush()?;
        progress_bar.finish();

        for failure in report.failures.iter() {
            eprintln!("{}", style(failure).red());
        }
        println!(
            "{}",
            style(format!(
                "Wrote {} segments to {}.",
                report.calls.len(),
                self.output.display()
            ))
            .green()
            .bold()
        );
        if !report.is_success() {
            eprintln!(
                "{}",
                style(format!("{} units failed.", report.failures.len()))
                    .red()
                    .bold()
            );
        }
        Ok(report.is_success())
    }
}
