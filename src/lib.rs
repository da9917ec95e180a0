//! Run provisioner for the Maxfield link planner.
//!
//! maxrun validates run parameters, provisions an output directory, and
//! shells out to the `maxfield-plan` executable with a fixed argument set,
//! mirroring its exit code. The planner does all of the actual work; this
//! crate owns only the glue around it.

pub mod cli;
pub mod config;
pub mod error;
pub mod plan;
pub mod provision;
pub mod runner;
pub mod translate;
