#![allow(dead_code)]
use methseg::prelude::*;
use rand::{
    Rng,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use rand_distr::{
    Distribution,
    Normal,
};

/// Synthetic nanopore calls for a single chromosome.
///
/// Every read spans the whole chromosome and misses a call with
/// `missing_rate`. A call is methylated with the rate of its sample at that
/// position, its LLR magnitude is drawn around 2.5.
pub struct DemoCallsBuilder {
    rng:              ChaCha8Rng,
    chrom:            String,
    n_positions:      usize,
    reads_per_sample: usize,
    missing_rate:     f64,
    rates:            Vec<(String, Vec<f64>)>,
}

impl DemoCallsBuilder {
    pub fn new(
        chrom: &str,
        n_positions: usize,
        seed: u64,
    ) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            chrom: chrom.to_string(),
            n_positions,
            reads_per_sample: 20,
            missing_rate: 0.1,
            rates: Vec::new(),
        }
    }

    pub fn with_reads_per_sample(
        mut self,
        n: usize,
    ) -> Self {
        self.reads_per_sample = n;
        self
    }

    pub fn with_missing_rate(
        mut self,
        rate: f64,
    ) -> Self {
        self.missing_rate = rate;
        self
    }

    /// Adds a sample whose methylation rate at position index `i` is
    /// `rate(i)`.
    pub fn with_sample(
        mut self,
        name: &str,
        rate: impl Fn(usize) -> f64,
    ) -> Self {
        let rates = (0..self.n_positions).map(rate).collect();
        self.rates.push((name.to_string(), rates));
        self
    }

    /// Genomic coordinate of position index `i`.
    pub fn position(i: usize) -> PosType {
        1000 + 10 * i as PosType
    }

    pub fn rows(&mut self) -> Vec<CallRow> {
        let magnitude = Normal::<f64>::new(2.5, 0.5).unwrap();
        let mut rows = Vec::new();
        for (sample, rates) in self.rates.iter() {
            for read in 0..self.reads_per_sample {
                let read_name = format!("{}_{}_{}", self.chrom, sample, read);
                for (i, rate) in rates.iter().enumerate() {
                    if self.rng.gen_bool(self.missing_rate) {
                        continue;
                    }
                    let llr = magnitude.sample(&mut self.rng).abs() as LlrType;
                    let methylated = self.rng.gen_bool(*rate);
                    rows.push(CallRow {
                        chromosome: self.chrom.clone(),
                        position:   Self::position(i),
                        read_name:  read_name.clone(),
                        sample:     sample.clone(),
                        llr:        if methylated { llr } else { -llr },
                    });
                }
            }
        }
        rows
    }

    pub fn matrix(&mut self) -> SparseCallMatrix {
        let mut builder = SparseCallMatrixBuilder::new();
        for row in self.rows() {
            builder
                .push(&row.read_name, &row.sample, row.position, row.llr)
                .unwrap();
        }
        builder.build()
    }
}

/// Writes rows as a call table.
pub fn write_table<W: std::io::Write>(
    writer: W,
    rows: &[CallRow],
) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::default()
        .delimiter(b'\t')
        .has_headers(true)
        .from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Two samples; `A` drops from 0.9 to 0.1 at position index 50, `B` stays
/// at 0.5.
pub fn step_calls(seed: u64) -> DemoCallsBuilder {
    DemoCallsBuilder::new("chr1", 100, seed)
        .with_sample("A", |i| if i < 50 { 0.9 } else { 0.1 })
        .with_sample("B", |_| 0.5)
}

/// Two samples at constant, well separated rates.
pub fn flat_calls(
    chrom: &str,
    n_positions: usize,
    seed: u64,
) -> DemoCallsBuilder {
    DemoCallsBuilder::new(chrom, n_positions, seed)
        .with_sample("A", |_| 0.8)
        .with_sample("B", |_| 0.2)
}
