//! Normalize Clash profiles around their node list.
//!
//! The [`reconcile`] module holds the pure transformation; [`codec`] and
//! [`config`] back the `clash-reconcile` command-line tool.

pub mod codec;
pub mod config;
pub mod reconcile;

pub use reconcile::{reconcile, ConfigReconciler, ReconcileReport};
