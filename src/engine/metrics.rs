//! Apply metrics.
//!
//! Timings and counters for one `apply` call. They are collected only on the
//! verbose path (`PatchRules::apply_verbose`); plain `apply` skips the clock
//! reads.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyMetrics {
    /// Total elapsed time of the call.
    pub total: Duration,
    /// Time spent enumerating leaf paths of the candidate document.
    pub enumerate: Duration,
    /// Time spent resolving verdicts.
    pub resolve: Duration,
    /// Time spent cloning the old document and writing permitted values.
    pub patch: Duration,
    /// Number of leaf paths the candidate document produced.
    pub leaf_paths: usize,
    /// Number of effective paths in the verdict map.
    pub verdicts: usize,
}
