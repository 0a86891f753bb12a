//! Analysis tools of the crate.
//!
//! - [`segment`]: joint segmentation of one task unit. LLRs are converted to
//!   probabilities, a Bernoulli emission HMM is trained with Baum-Welch and
//!   decoded per position, and similar adjacent segments are merged.
//! - [`pool`]: parallel driver running [`segment`] over many task units with
//!   reader and worker threads, reassembling windows per chromosome.
pub mod pool;
pub mod segment;
