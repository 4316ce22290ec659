//! Rule compilation, permission resolution and patch application.
//!
//! This module holds everything behind the public [`PatchRules`](crate::PatchRules)
//! facade. The pieces live in focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! rule strings ──┐
//!                │  RuleSpec::compile            (compiled_rules.rs)
//!                └───────────────┬──────────────
//!                                │  (once, at construction)
//!                                v
//! new document ── leaf_paths ────┤               (paths.rs)
//!                                v
//!                        resolve (resolve.rs)
//!                          - rules in declared order
//!                          - later rules win over the whole subtree
//!                          - default deny for uncovered leaves
//!                                │
//!                                v
//! old document ── clone ── patch (patcher.rs)
//!                          - set / unset / replace
//!                          - dedupe via ScalarKey (dedup.rs)
//!                                │
//!                                v
//!                           PatchOutcome
//! ```
//!
//! Every mutation goes through the path-addressed helpers in `tree.rs`.
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: parses one rule string into a `RuleSpec` (anchored
//!   regex + scope path + flags).
//! - `paths.rs`: lazily enumerates canonical leaf paths of a document.
//! - `resolve.rs`: builds the ordered verdict map.
//! - `dedup.rs`: hashable keys for scalar values and order-preserving dedup.
//! - `patcher.rs`: applies verdicts to the working copy.
//! - `tree.rs`: get/set/unset by dotted and bracketed path.
//! - `metrics.rs`: optional timing data for one call.
//!
//! ## Debugging
//!
//! All phases log through `tracing`; the CLI reads its filter from
//! `PATCH_RULES_LOG` (for example `PATCH_RULES_LOG=patch_rules=trace`).

#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/dedup.rs"]
mod dedup;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/patcher.rs"]
mod patcher;
#[path = "engine/paths.rs"]
mod paths;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/tree.rs"]
pub mod tree;

pub use compiled_rules::{RuleFlags, RuleSpec};
pub use metrics::ApplyMetrics;
pub(crate) use patcher::{check_root_kinds, patch};
pub(crate) use paths::leaf_paths;
pub(crate) use resolve::{VerdictMap, resolve};
