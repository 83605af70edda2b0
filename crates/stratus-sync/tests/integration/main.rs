//! Integration tests for stratus-sync
//!
//! Drives the reconciler, the sync scheduler and the recycle manager against
//! an in-memory SQLite store and a scripted cloud gateway.

mod common;

mod test_reconcile;
mod test_scheduler;
