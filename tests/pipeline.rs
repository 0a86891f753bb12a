use std::sync::Arc;

use arcstr::ArcStr;
use methseg::prelude::*;
use rstest::*;

mod common;
use common::{
    flat_calls,
    step_calls,
    write_table,
};

/// Three chromosomes: a step, a flat one and a short flat one.
#[fixture]
fn calls_table() -> Vec<CallRow> {
    let mut rows = step_calls(7).rows();
    rows.extend(flat_calls("chr2", 60, 8).rows());
    rows.extend(flat_calls("chr3", 25, 9).rows());
    rows
}

#[fixture]
fn tsv_store(calls_table: Vec<CallRow>) -> TsvCallStore {
    let file = tempfile::NamedTempFile::new().unwrap();
    write_table(file.reopen().unwrap(), &calls_table).unwrap();
    TsvCallStore::from_path(file.path()).unwrap()
}

fn pipeline(n_worker: usize) -> SegmentationPipeline {
    let _ = pretty_env_logger::try_init();
    SegmentationPipeline::new(
        SegmentationConfig::default().with_max_segments(3),
        PipelineConfig::default()
            .with_n_worker(n_worker)
            .with_n_reader(2)
            .with_queue_capacity(2),
    )
}

#[test]
fn test_adjacent_windows_are_merged() -> anyhow::Result<()> {
    let rows = flat_calls("chr1", 60, 11).rows();
    let store = TsvCallStore::from_reader({
        let mut buf = Vec::new();
        write_table(&mut buf, &rows)?;
        std::io::Cursor::new(buf)
    })?;
    let units = store.task_units(Some(30))?;
    assert_eq!(units.len(), 2);

    let mut sink = MemorySink::default();
    let report = pipeline(2).run(Arc::new(store), units, &mut sink)?;

    assert!(report.is_success());
    assert_eq!(report.calls.len(), 1, "calls: {:?}", report.calls);
    let call = &report.calls[0];
    assert_eq!(call.n_positions, 60);
    assert_eq!(call.start, common::DemoCallsBuilder::position(0));
    assert_eq!(call.end, common::DemoCallsBuilder::position(59) + 1);
    assert_eq!(sink.calls, report.calls);
    Ok(())
}

#[rstest]
fn test_output_independent_of_workers(tsv_store: TsvCallStore) -> anyhow::Result<()> {
    let units = tsv_store.task_units(Some(20))?;
    let store: Arc<dyn CallStore> = Arc::new(tsv_store);

    let mut single = MemorySink::default();
    let single_report = pipeline(1).run(store.clone(), units.clone(), &mut single)?;
    let mut many = MemorySink::default();
    let many_report = pipeline(8).run(store, units, &mut many)?;

    assert!(single_report.is_success());
    assert_eq!(single_report.calls, many_report.calls);
    assert_eq!(single.calls, many.calls);
    assert_eq!(
        many.chroms,
        vec![ArcStr::from("chr1"), ArcStr::from("chr2"), ArcStr::from("chr3")]
    );
    Ok(())
}

#[rstest]
fn test_calls_are_ordered(tsv_store: TsvCallStore) -> anyhow::Result<()> {
    let units = tsv_store.task_units(Some(15))?;
    let mut sink = MemorySink::default();
    let report = pipeline(4).run(Arc::new(tsv_store), units, &mut sink)?;

    for pair in report.calls.windows(2) {
        if pair[0].chrom == pair[1].chrom {
            assert!(pair[0].end <= pair[1].start);
        }
    }
    Ok(())
}

#[test]
fn test_failed_unit_is_reported() -> anyhow::Result<()> {
    let mut store = MemoryStore::default();
    store.insert(TaskUnit::chromosome("chr1"), step_calls(3).matrix());
    store.insert(
        TaskUnit::chromosome("chr2"),
        SparseCallMatrix::new(vec![], vec![1], vec![]),
    );

    let units = vec![
        TaskUnit::chromosome("chr1"),
        TaskUnit::chromosome("chr2"),
        TaskUnit::chromosome("chr3"),
    ];
    let mut sink = MemorySink::default();
    let report = pipeline(2).run(Arc::new(store), units, &mut sink)?;

    assert!(!report.is_success());
    assert!(!report.calls.is_empty());
    let kinds = report
        .failures
        .iter()
        .map(|f| (f.unit.chrom().to_string(), f.kind))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            ("chr2".to_string(), FailureKind::MalformedMatrix),
            ("chr3".to_string(), FailureKind::Store),
        ]
    );
    assert_eq!(sink.failures.len(), 2);
    Ok(())
}

#[test]
fn test_fail_fast_cancels_remaining() -> anyhow::Result<()> {
    let mut store = MemoryStore::default();
    let units = (0..20)
        .map(|i| TaskUnit::chromosome(format!("chr{}", i)))
        .collect::<Vec<_>>();
    // Every unit is malformed, so the first failure cancels the run
    for unit in units.iter() {
        store.insert(unit.clone(), SparseCallMatrix::new(vec![], vec![1], vec![]));
    }
    let pipeline = SegmentationPipeline::new(
        SegmentationConfig::default(),
        PipelineConfig::default()
            .with_n_worker(1)
            .with_n_reader(1)
            .with_queue_capacity(1)
            .with_fail_fast(true),
    );
    let mut sink = MemorySink::default();
    let report = pipeline.run(Arc::new(store), units, &mut sink)?;

    assert_eq!(report.failures.len(), 20);
    assert!(report.n_cancelled() > 0);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f.kind, FailureKind::MalformedMatrix | FailureKind::Cancelled)));
    Ok(())
}

struct FailingSink;

impl SegmentSink for FailingSink {
    fn write_calls(
        &mut self,
        _chrom: &ArcStr,
        _calls: &[SegmentCall],
    ) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    fn write_failure(
        &mut self,
        _failure: &TaskFailure,
    ) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}

#[rstest]
fn test_sink_error_aborts(tsv_store: TsvCallStore) {
    let units = tsv_store.task_units(None).unwrap();
    let res = pipeline(2).run(Arc::new(tsv_store), units, &mut FailingSink);
    assert!(res.is_err());
}

#[rstest]
fn test_writer_output(tsv_store: TsvCallStore) -> anyhow::Result<()> {
    let units = tsv_store.task_units(None)?;
    let out = tempfile::NamedTempFile::new()?;
    let mut writer = SegmentWriter::from_path(out.path())?;
    let report = pipeline(2).run(Arc::new(tsv_store), units, &mut writer)?;
    writer.flush()?;

    let text = std::fs::read_to_string(out.path())?;
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("chromosome\tstart\tend\tlabel\tn_positions\tn_reads\tsamples")
    );
    assert_eq!(lines.count(), report.calls.len());
    Ok(())
}

#[test]
fn test_writer_records_failed_units() -> anyhow::Result<()> {
    let mut store = MemoryStore::default();
    store.insert(TaskUnit::chromosome("chr1"), step_calls(5).matrix());
    store.insert(
        TaskUnit::chromosome("chr2"),
        SparseCallMatrix::new(vec![], vec![1], vec![]),
    );
    let units = vec![TaskUnit::chromosome("chr1"), TaskUnit::chromosome("chr2")];

    let mut writer = SegmentWriter::new(Vec::new())?;
    let report = pipeline(2).run(Arc::new(store), units, &mut writer)?;
    let text = String::from_utf8(writer.into_inner()?)?;

    assert_eq!(report.failures.len(), 1);
    let failed = text
        .lines()
        .filter(|line| line.starts_with("chr2\t"))
        .collect::<Vec<_>>();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].contains("FAILED:MalformedMatrix"));
    assert_eq!(
        text.lines().filter(|line| line.starts_with("chr1\t")).count(),
        report.calls.len()
    );
    Ok(())
}
