// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors reported by the collaborators of the graph manager

use lsi::{Dpid, VLinkId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FabricError {
    #[error("Failed to discover physical ports: {0}")]
    Discovery(String),
    #[error("Failed to create switch: {reason}")]
    SwitchCreation {
        /// Set if the switch was partially created and must be destroyed
        partial: Option<Dpid>,
        reason: String,
    },
    #[error("Unknown switch {0}")]
    UnknownSwitch(Dpid),
    #[error("Failed to destroy switch {0}: {1}")]
    SwitchDestruction(Dpid, String),
    #[error("Failed to create virtual link on {0}: {1}")]
    VLinkCreation(Dpid, String),
    #[error("Failed to destroy {1} of switch {0}: {2}")]
    VLinkDestruction(Dpid, VLinkId, String),
    #[error("Failed to handle ports of network function {1} on {0}: {2}")]
    NfPorts(Dpid, String, String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ControllerError {
    #[error("Controller on port {0} failed to start: {1}")]
    Start(u16, String),
    #[error("Controller on port {0} failed to install rules: {1}")]
    Install(u16, String),
    #[error("Controller on port {0} failed to remove rules: {1}")]
    Removal(u16, String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NfRuntimeError {
    #[error("Network function repository is unreachable: {0}")]
    Unreachable(String),
    #[error("Bad description for network function {0}: {1}")]
    BadDescription(String, String),
}
