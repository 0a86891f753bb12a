//! Utility functions and helper macros used throughout the methseg crate.
//!
//! Key functionalities include:
//!
//! - Thread count resolution from the `METHSEG_NUM_THREADS` environment
//!   variable, falling back to rayon's global pool size.
//! - Probability helpers used by the HMM (LLR conversion, clipping, argmax).
//! - A macro generating builder-style `with_*` methods for config structs.

use once_cell::sync::Lazy;

mod stats;
pub use stats::*;

/// Name of the environment variable overriding the default worker count.
pub const NUM_THREADS_ENV: &str = "METHSEG_NUM_THREADS";

static DEFAULT_THREADS: Lazy<usize> = Lazy::new(|| {
    std::env::var(NUM_THREADS_ENV)
        .ok()
        .and_then(|str| str.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(rayon::current_num_threads)
});

/// Number of compute workers used when none is configured explicitly.
pub fn n_threads() -> usize {
    *DEFAULT_THREADS
}

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
                self.$field_name = value;
                self
            }
        }
    };
}
