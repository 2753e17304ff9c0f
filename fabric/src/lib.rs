// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Contracts of the components the graph manager drives: the switch fabric, the per-switch
//! flow controllers, the network function runtime and the wireless bridge.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod controller;
pub mod errors;
pub mod nfruntime;
pub mod switch;
pub mod wireless;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use controller::{ControllerFactory, FlowController};
pub use errors::{ControllerError, FabricError, NfRuntimeError};
pub use nfruntime::{Description, NfRuntime, NfRuntimeFactory};
pub use switch::{PortDescriptor, SwitchFabric};
pub use wireless::{ShellWireless, WirelessControl};

use tracectl::trace_target;
trace_target!("fabric", LevelFilter::INFO, &["graph"]);
