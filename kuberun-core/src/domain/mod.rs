//! Core domain types
//!
//! These types describe one job from rendering to teardown and are shared
//! between the scheduler client (which produces statuses) and the runner
//! (which drives the lifecycle).

pub mod job;
pub mod run;
