//! Stories about moving workloads between Helm and Argo CD
//!
//! - `properties`: guarantees that hold for every batch (partitioning,
//!   idempotent deletes, restart-safe completion, the gates)
//! - `scenarios`: concrete migrations an operator runs end to end

mod fakes;
mod properties;
mod scenarios;
