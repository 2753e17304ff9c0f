// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Deployment of service graphs on a node. Every graph gets a switch of its own, attached
//! to the switch holding the physical ports of the node (switch-0) by virtual links, and
//! its network functions are started on that switch.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod errors;
pub mod gc;
mod manager;
pub mod nfstart;
pub mod params;
pub mod registry;
pub mod snapshot;
pub mod translator;
pub mod validity;
pub mod vlinks;

pub use errors::{GraphManagerError, GraphManagerResult, Rejection, Violation};
pub use manager::{Collaborators, GraphManager};
pub use params::{GraphManagerParams, GraphManagerParamsBuilder};
pub use registry::EndpointRegistry;
pub use translator::{Translation, TranslationError, Translator};

use tracectl::trace_target;
trace_target!("graph-manager", LevelFilter::INFO, &["graph"]);
