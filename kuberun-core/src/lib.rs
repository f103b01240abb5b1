//! Kuberun Core
//!
//! Core types for running a single containerized task as a cluster batch job.
//!
//! This crate contains:
//! - Domain types: the job descriptor, handle, status snapshots and run state
//! - Manifest: the declarative `batch/v1` Job document submitted to the cluster

pub mod domain;
pub mod manifest;
