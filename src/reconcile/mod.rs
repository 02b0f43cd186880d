//! Clash profile reconciliation.
//!
//! Takes a deserialized Clash profile and guarantees it carries a
//! round-robin load-balance group and a fallback group over the current
//! node list, that the top-level selectors expose every node, and that
//! dependent groups stop pointing at nodes which no longer exist.
//! Pure and synchronous: no I/O happens here.

pub mod diagnostics;
pub mod document;
pub mod error;
pub mod reconciler;
pub mod roles;
pub mod union;

pub use diagnostics::{Diagnostics, MemoryDiagnostics, SilentDiagnostics, TracingDiagnostics};
pub use document::{empty_document, DocumentSummary, GroupSummary};
pub use error::ReconcileError;
pub use reconciler::{reconcile, ConfigReconciler, Phase, ReconcileReport};
pub use roles::{
    selected_probe_target, GroupKind, GroupRole, ProbeScheme, Sentinel, PROBE_TARGETS,
};
pub use union::ordered_union;
