//! Incremental root completion engine
//!
//! This module provides:
//! - Root extraction at the caret (`root`)
//! - Ranked, capped, exact-match-narrowed candidate resolution (`resolver`)
//! - Cheap list fingerprints for "nothing changed" detection (`fingerprint`)
//! - The host-facing provider with stale/cancel guards (`provider`)
//! - The event-driven show/keep/hide controller (`retrigger`)
//!
//! ```text
//! keystroke ─▶ root ─▶ BucketStore (async) ─▶ resolver ─▶ fingerprint ─▶ retrigger ─▶ host
//! ```

pub mod fingerprint;
pub mod provider;
pub mod resolver;
pub mod retrigger;
pub mod root;

pub use fingerprint::Fingerprint;
pub use provider::{CaretContext, CaretSource, CompletionProvider, HostSurface, Resolution};
pub use resolver::{
    Candidate, CandidateList, CandidateResolver, ColumnRange, ResolverOptions, rank_candidates,
};
pub use retrigger::{Decision, EditEvent, RetriggerController};
pub use root::{RootSpan, extract_root, is_root_char, locate_root};
