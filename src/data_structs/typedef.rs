/// 1-based genomic coordinate.
pub type PosType = u32;
/// Methylation log-likelihood ratio of a single read call.
pub type LlrType = f32;
/// Index of a hidden state (segment type).
pub type LabelType = usize;
/// Dense sample id within one task unit.
pub type SampleId = usize;
