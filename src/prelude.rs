pub use crate::data_structs::typedef::{
    LabelType,
    LlrType,
    PosType,
    SampleId,
};
pub use crate::data_structs::{
    CallEntry,
    FailureKind,
    SampleIndex,
    SampleStat,
    SegmentCall,
    SparseCallMatrix,
    SparseCallMatrixBuilder,
    TaskFailure,
    TaskUnit,
};
pub use crate::error::{
    Result as SegmentationResult,
    SegmentationError,
};
pub use crate::io::{
    CallRow,
    CallStore,
    MemorySink,
    MemoryStore,
    SegmentSink,
    SegmentWriter,
    TsvCallStore,
};
pub use crate::tools::pool::{
    CancellationToken,
    PipelineConfig,
    PipelineReport,
    SegmentationPipeline,
};
pub use crate::tools::segment::{
    segment,
    EmissionPrior,
    SegmentationConfig,
};
