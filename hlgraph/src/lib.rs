// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! High-level service graphs: how traffic flows between physical ports, network functions
//! and endpoints shared with other graphs.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod document;
pub mod errors;
pub mod graph;
pub mod ids;
pub mod nf;
pub mod rule;

pub use document::GraphDocument;
pub use errors::GraphError;
pub use graph::{Graph, RemovedRule};
pub use ids::{EndpointId, FlowId, GraphId, NfPort};
pub use nf::{NetworkFunction, PortRequirements};
pub use rule::{Anchor, HeaderFields, Match, Rule};

use tracectl::trace_target;
trace_target!("hlgraph", LevelFilter::INFO, &["graph"]);
