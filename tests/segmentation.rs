use arcstr::ArcStr;
use itertools::Itertools;
use methseg::data_structs::CallEntry;
use methseg::prelude::*;
use methseg::tools::segment::{
    label_runs,
    merge_runs,
    preprocess,
    SegmentationHmm,
};
use ndarray::Axis;
use rstest::*;

mod common;
use common::{
    step_calls,
    DemoCallsBuilder,
};

#[fixture]
fn step_matrix() -> SparseCallMatrix {
    step_calls(42).matrix()
}

#[rstest]
fn test_step_gives_two_segments(step_matrix: SparseCallMatrix) -> anyhow::Result<()> {
    let config = SegmentationConfig::default().with_max_segments(4);
    let calls = segment(&step_matrix, &config, &ArcStr::from("chr1"))?;

    assert_eq!(calls.len(), 2, "calls: {:?}", calls);
    let boundary = calls[1].start as i64;
    let expected = DemoCallsBuilder::position(50) as i64;
    assert!(
        (boundary - expected).abs() <= 20,
        "boundary at {}, expected {}",
        boundary,
        expected
    );

    assert!(calls[0].mean("A").unwrap() > 0.7);
    assert!(calls[1].mean("A").unwrap() < 0.3);
    assert_eq!(calls[0].start, DemoCallsBuilder::position(0));
    assert_eq!(calls[1].end, DemoCallsBuilder::position(99) + 1);
    assert_eq!(calls[0].end, calls[1].start);
    Ok(())
}

#[test]
fn test_step_is_stable_across_seeds() -> anyhow::Result<()> {
    let config = SegmentationConfig::default().with_max_segments(4);
    let expected = DemoCallsBuilder::position(50) as i64;
    for seed in 0..40 {
        let calls = segment(&step_calls(seed).matrix(), &config, &ArcStr::from("chr1"))?;
        let bounds = calls.iter().map(|c| (c.start, c.end)).collect_vec();
        assert_eq!(calls.len(), 2, "seed {}: {:?}", seed, bounds);
        assert!(
            (calls[1].start as i64 - expected).abs() <= 20,
            "seed {}: {:?}",
            seed,
            bounds
        );
    }
    Ok(())
}

#[rstest]
fn test_calls_tile_positions(step_matrix: SparseCallMatrix) -> anyhow::Result<()> {
    let config = SegmentationConfig::default()
        .with_max_segments(6)
        .with_min_parameter_diff(0.0);
    let calls = segment(&step_matrix, &config, &ArcStr::from("chr1"))?;

    assert_eq!(
        calls.iter().map(|c| c.n_positions).sum::<usize>(),
        step_matrix.n_positions()
    );
    for (a, b) in calls.iter().tuple_windows() {
        assert!(a.end <= b.start);
    }
    assert!(calls.iter().all(|c| c.label < 6));
    Ok(())
}

#[rstest]
fn test_posterior_is_normalized(step_matrix: SparseCallMatrix) -> anyhow::Result<()> {
    let data = preprocess(&step_matrix)?;
    let hmm = SegmentationHmm::new(&SegmentationConfig::default().with_max_segments(5))?;
    let trained = hmm.baum_welch(&data)?;

    for row in trained.posterior.axis_iter(Axis(0)) {
        assert!((row.sum() - 1.0).abs() < 1e-6);
    }
    for row in trained.state.transitions.axis_iter(Axis(0)) {
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }
    let labels = SegmentationHmm::map(trained.posterior.view());
    assert!(labels.iter().all(|l| *l < 5));
    Ok(())
}

#[rstest]
fn test_cleanup_idempotent_and_monotone(step_matrix: SparseCallMatrix) -> anyhow::Result<()> {
    let config = SegmentationConfig::default().with_max_segments(8);
    let data = preprocess(&step_matrix)?;
    let trained = SegmentationHmm::new(&config)?.baum_welch(&data)?;
    let labels = SegmentationHmm::map(trained.posterior.view());
    let runs = label_runs(&labels, &trained.state.emission, &data.call_counts());

    let mut counts = Vec::new();
    for threshold in [0.0, 0.05, 0.2, 0.5, 1.1] {
        let once = merge_runs(runs.clone(), threshold);
        let twice = merge_runs(once.clone(), threshold);
        assert_eq!(once, twice);
        counts.push(once.len());
    }
    assert!(counts.iter().tuple_windows().all(|(a, b)| a >= b), "{:?}", counts);
    assert_eq!(counts.last(), Some(&1));
    Ok(())
}

#[test]
fn test_zero_reads_is_malformed() {
    let matrix = SparseCallMatrix::new(vec![], vec![1, 2, 3], vec![]);
    let res = segment(&matrix, &SegmentationConfig::default(), &ArcStr::from("chr1"));
    assert!(matches!(res, Err(SegmentationError::MalformedMatrix(_))));
}

#[test]
fn test_reads_without_calls_give_single_segment() -> anyhow::Result<()> {
    let matrix = SparseCallMatrix::new(
        vec![ArcStr::from("A"), ArcStr::from("A"), ArcStr::from("B")],
        vec![10, 20, 30, 40],
        vec![],
    );
    let calls = segment(&matrix, &SegmentationConfig::default(), &ArcStr::from("chr1"))?;
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].start, calls[0].end), (10, 41));
    assert_eq!(calls[0].n_reads, 0);
    assert!(calls[0].samples.is_empty());
    Ok(())
}

#[rstest]
#[case::sample_count(SparseCallMatrix::from_parts(
    3,
    vec![ArcStr::from("A")],
    vec![1],
    vec![CallEntry::new(0, 0, 1.0)],
))]
#[case::unsorted_positions(SparseCallMatrix::new(
    vec![ArcStr::from("A")],
    vec![5, 1],
    vec![CallEntry::new(0, 0, 1.0)],
))]
#[case::out_of_bounds(SparseCallMatrix::new(
    vec![ArcStr::from("A")],
    vec![1],
    vec![CallEntry::new(0, 3, 1.0)],
))]
#[case::nan(SparseCallMatrix::new(
    vec![ArcStr::from("A")],
    vec![1],
    vec![CallEntry::new(0, 0, f32::NAN)],
))]
#[case::duplicate(SparseCallMatrix::new(
    vec![ArcStr::from("A")],
    vec![1],
    vec![CallEntry::new(0, 0, 1.0), CallEntry::new(0, 0, 2.0)],
))]
fn test_malformed_matrices(#[case] matrix: SparseCallMatrix) {
    assert!(matches!(
        preprocess(&matrix),
        Err(SegmentationError::MalformedMatrix(_))
    ));
}

#[test]
fn test_infinite_llr_is_clipped() -> anyhow::Result<()> {
    let matrix = SparseCallMatrix::new(
        vec![ArcStr::from("A"); 2],
        vec![1, 2],
        vec![
            CallEntry::new(0, 0, f32::INFINITY),
            CallEntry::new(1, 1, f32::NEG_INFINITY),
        ],
    );
    let data = preprocess(&matrix)?;
    assert!(data.probs.get(0, 0).unwrap() < 1.0);
    assert!(data.probs.get(1, 1).unwrap() > 0.0);
    assert_eq!(data.probs.get(0, 1), None);
    Ok(())
}

#[test]
fn test_underflow_is_reported() {
    let n_reads = 60;
    let matrix = SparseCallMatrix::new(
        vec![ArcStr::from("A"); n_reads],
        vec![1, 2],
        (0..n_reads as u32)
            .map(|r| CallEntry::new(r, 0, 100.0))
            .collect(),
    );
    let config = SegmentationConfig::default()
        .with_max_segments(2)
        .with_t_stay(1.0)
        .with_t_move(0.0)
        .with_eps(0.0)
        .with_prior(EmissionPrior::Explicit(vec![1e-6, 1.0 - 1e-6]));
    let res = segment(&matrix, &config, &ArcStr::from("chr1"));
    assert!(matches!(
        res,
        Err(SegmentationError::NumericalInstability { position: 0, .. })
    ));
}
