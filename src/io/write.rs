use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use arcstr::ArcStr;
use itertools::Itertools;
use log::warn;
use serde::Serialize;

use super::SegmentSink;
use crate::data_structs::typedef::{
    LabelType,
    PosType,
};
use crate::data_structs::{
    SegmentCall,
    TaskFailure,
};

const HEADER: [&str; 7] = [
    "chromosome",
    "start",
    "end",
    "label",
    "n_positions",
    "n_reads",
    "samples",
];

#[derive(Debug, Serialize)]
struct SegmentRow<'a> {
    chromosome:  &'a str,
    start:       PosType,
    end:         PosType,
    label:       LabelType,
    n_positions: usize,
    n_reads:     usize,
    samples:     String,
}

impl<'a> From<&'a SegmentCall> for SegmentRow<'a> {
    fn from(call: &'a SegmentCall) -> Self {
        Self {
            chromosome:  call.chrom.as_str(),
            start:       call.start,
            end:         call.end,
            label:       call.label,
            n_positions: call.n_positions,
            n_reads:     call.n_reads,
            samples:     format_samples(call),
        }
    }
}

/// A unit without calls. Whole-chromosome units leave the coordinates
/// empty, the label column holds `FAILED:<kind>` and the samples column the
/// error message.
#[derive(Debug, Serialize)]
struct FailureRow<'a> {
    chromosome:  &'a str,
    start:       Option<PosType>,
    end:         Option<PosType>,
    label:       String,
    n_positions: Option<usize>,
    n_reads:     Option<usize>,
    samples:     &'a str,
}

impl<'a> From<&'a TaskFailure> for FailureRow<'a> {
    fn from(failure: &'a TaskFailure) -> Self {
        let bounds = failure.unit.bounds();
        Self {
            chromosome:  failure.unit.chrom().as_str(),
            start:       bounds.map(|(start, _)| start),
            end:         bounds.map(|(_, end)| end),
            label:       format!("FAILED:{:?}", failure.kind),
            n_positions: None,
            n_reads:     None,
            samples:     failure.message.as_str(),
        }
    }
}

/// `name=mean:count` pairs sorted by sample name.
fn format_samples(call: &SegmentCall) -> String {
    call.samples
        .iter()
        .map(|(name, stat)| format!("{}={:.4}:{}", name, stat.mean, stat.n_calls))
        .join(",")
}

/// Writes segment calls as a tab-separated table. Failed units get a
/// [`FailureRow`] in place of their calls.
pub struct SegmentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl SegmentWriter<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = File::create(path.as_ref()).with_context(|| {
            format!("Failed to create output file {}", path.as_ref().display())
        })?;
        Self::new(file)
    }
}

impl<W: Write> SegmentWriter<W> {
    /// Wraps a writer and writes the header line.
    pub fn new(writer: W) -> anyhow::Result<Self> {
        let mut writer = csv::WriterBuilder::default()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(HEADER)?;
        Ok(Self { writer })
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> anyhow::Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush segment writer: {}", e))
    }
}

impl<W: Write> SegmentSink for SegmentWriter<W> {
    fn write_calls(
        &mut self,
        _chrom: &ArcStr,
        calls: &[SegmentCall],
    ) -> anyhow::Result<()> {
        for call in calls {
            self.writer
                .serialize(SegmentRow::from(call))
                .context("Failed to write segment")?;
        }
        Ok(())
    }

    fn write_failure(
        &mut self,
        failure: &TaskFailure,
    ) -> anyhow::Result<()> {
        warn!("{}", failure);
        self.writer
            .serialize(FailureRow::from(failure))
            .context("Failed to write failure record")?;
        Ok(())
    }
}
