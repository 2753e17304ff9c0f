// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing of the orchestrator, controllable at runtime. Crates declare their targets with
//! [`trace_target!`]; levels are then set per target or per tag through [`get_trace_ctl`].

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod control;
pub mod display;
pub mod errors;
pub mod targets;

// re-exports
pub use control::{TracingControl, get_trace_ctl};
pub use errors::TraceCtlError;
pub use tracing_subscriber::filter::LevelFilter;
