use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{
    anyhow,
    bail,
    ensure,
    Context,
};
use arcstr::ArcStr;
use hashbrown::{
    HashMap,
    HashSet,
};
use itertools::Itertools;
use log::info;
use serde::{
    Deserialize,
    Serialize,
};

use super::CallStore;
use crate::data_structs::typedef::{
    LlrType,
    PosType,
};
use crate::data_structs::{
    SparseCallMatrix,
    SparseCallMatrixBuilder,
    TaskUnit,
};

/// One line of a call table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRow {
    pub chromosome: String,
    pub position:   PosType,
    pub read_name:  String,
    pub sample:     String,
    pub llr:        LlrType,
}

#[derive(Debug, Clone)]
struct StoredCall {
    position:  PosType,
    read_name: ArcStr,
    sample:    ArcStr,
    llr:       LlrType,
}

/// Call store over a tab-separated table with the header
/// `chromosome position read_name sample llr`.
///
/// The table is read into memory once. Calls of a chromosome are kept sorted
/// by position, so a window load is a range lookup.
#[derive(Debug, Clone, Default)]
pub struct TsvCallStore {
    /// Chromosomes in order of first appearance.
    chroms: Vec<ArcStr>,
    calls:  HashMap<ArcStr, Vec<StoredCall>>,
}

impl TsvCallStore {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = File::open(path.as_ref()).with_context(|| {
            format!("Failed to open call table {}", path.as_ref().display())
        })?;
        let store = Self::from_reader(file)?;
        info!(
            "Loaded {} calls on {} chromosomes from {}",
            store.n_calls(),
            store.chroms.len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    pub fn from_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::default()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);

        let mut interned: HashSet<ArcStr> = HashSet::new();
        let mut intern = |value: String| -> ArcStr {
            interned
                .get_or_insert_with(value.as_str(), |s: &str| ArcStr::from(s))
                .clone()
        };

        let mut store = Self::default();
        for (line, row) in csv_reader.deserialize::<CallRow>().enumerate() {
            let row = row.with_context(|| format!("Malformed call at record {}", line + 1))?;
            let chrom = intern(row.chromosome);
            let stored = StoredCall {
                position:  row.position,
                read_name: intern(row.read_name),
                sample:    intern(row.sample),
                llr:       row.llr,
            };
            store
                .calls
                .entry(chrom.clone())
                .or_insert_with(|| {
                    store.chroms.push(chrom);
                    Vec::new()
                })
                .push(stored);
        }

        for calls in store.calls.values_mut() {
            calls.sort_by_key(|c| c.position);
        }
        Ok(store)
    }

    pub fn chroms(&self) -> &[ArcStr] {
        &self.chroms
    }

    pub fn n_calls(&self) -> usize {
        self.calls.values().map(Vec::len).sum()
    }

    /// Work list of the store.
    ///
    /// `None` gives one unit per chromosome. `Some(n)` splits every
    /// chromosome into consecutive windows of at most `n` distinct
    /// positions, each spanning `[first, last + 1)`.
    pub fn task_units(
        &self,
        window_positions: Option<usize>,
    ) -> anyhow::Result<Vec<TaskUnit>> {
        let Some(size) = window_positions
        else {
            return Ok(self
                .chroms
                .iter()
                .cloned()
                .map(TaskUnit::chromosome)
                .collect());
        };
        ensure!(size > 0, "Window size must be at least one position");

        let mut units = Vec::new();
        for chrom in self.chroms.iter() {
            let positions = self.calls[chrom]
                .iter()
                .map(|c| c.position)
                .dedup()
                .collect_vec();
            for window in positions.chunks(size) {
                if let (Some(first), Some(last)) = (window.first(), window.last()) {
                    units.push(TaskUnit::window(chrom.clone(), *first, last + 1)?);
                }
            }
        }
        Ok(units)
    }
}

impl CallStore for TsvCallStore {
    fn load(
        &self,
        unit: &TaskUnit,
    ) -> anyhow::Result<SparseCallMatrix> {
        let calls = self
            .calls
            .get(unit.chrom())
            .ok_or_else(|| anyhow!("Chromosome {} not found in call table", unit.chrom()))?;
        let calls = match unit.bounds() {
            Some((start, end)) => {
                let lo = calls.partition_point(|c| c.position < start);
                let hi = calls.partition_point(|c| c.position < end);
                &calls[lo..hi]
            },
            None => &calls[..],
        };

        let mut seen = HashSet::with_capacity(calls.len());
        let mut builder = SparseCallMatrixBuilder::new();
        for call in calls {
            if !seen.insert((&call.read_name, call.position)) {
                bail!(
                    "Duplicated call for read {} at {}:{}",
                    call.read_name,
                    unit.chrom(),
                    call.position
                );
            }
            builder.push(&call.read_name, &call.sample, call.position, call.llr)?;
        }
        Ok(builder.build())
    }
}
