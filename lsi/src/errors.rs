// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

use crate::vlink::VLinkId;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LsiError {
    #[error("Virtual link {0} does not exist")]
    UnknownVLink(VLinkId),
    #[error("Virtual link {0} already exists or reuses a local port")]
    DuplicateVLink(VLinkId),
    #[error("Fabric did not report a switch port for physical port {0}")]
    MissingPhysicalPort(String),
    #[error("Fabric did not report a switch port for wireless port {0}")]
    MissingWirelessPort(String),
    #[error("Fabric did not report the ports of network function {0}")]
    MissingNfPorts(String),
    #[error("Network function {0} already has ports on this switch")]
    DuplicateNf(String),
    #[error("Expected {expected} virtual links but got {got}")]
    MissingVLinks { expected: usize, got: usize },
}
