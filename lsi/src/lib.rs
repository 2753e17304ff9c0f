// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Logical switches. Switch-0 owns the physical ports of the node; every graph gets its own
//! tenant switch, which hosts the graph's network function ports and is stitched to switch-0
//! through virtual links.

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
pub mod flowrule;
pub mod spec;
pub mod switch;
pub mod vlink;

pub use errors::LsiError;
pub use flowrule::{FlowRule, LowAction};
pub use spec::{ControllerAddr, LsiSpec, LsiSpecBuilder, NfSpec, NfType, SwitchLayout};
pub use switch::{Lsi, NfPorts, PhysicalPort, WIRELESS_PORT_KIND, WirelessPort};
pub use vlink::{Dpid, VLink, VLinkId};

use tracectl::trace_target;
trace_target!("lsi", LevelFilter::INFO, &["graph"]);
