use arcstr::ArcStr;
use hashbrown::HashMap;

use super::typedef::SampleId;

/// Bijection between sample names and dense ids `0..n_samples`.
///
/// Ids follow the order of first occurrence. The mapping is only meaningful
/// within the task unit it was built for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleIndex {
    names: Vec<ArcStr>,
    ids:   HashMap<ArcStr, SampleId>,
}

impl SampleIndex {
    /// Builds the index and the per-read id array in one pass.
    pub fn from_read_samples(read_samples: &[ArcStr]) -> (Self, Vec<SampleId>) {
        let mut index = Self::default();
        let sample_ids = read_samples
            .iter()
            .map(|s| index.insert(s))
            .collect();
        (index, sample_ids)
    }

    fn insert(
        &mut self,
        name: &ArcStr,
    ) -> SampleId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.clone());
        self.ids.insert(name.clone(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id(
        &self,
        name: &str,
    ) -> Option<SampleId> {
        self.ids.get(name).copied()
    }

    pub fn name(
        &self,
        id: SampleId,
    ) -> Option<&ArcStr> {
        self.names.get(id)
    }

    pub fn names(&self) -> &[ArcStr] {
        &self.names
    }
}
