// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors of the graph manager. Requests that cannot be honored are [`Rejection`]s and leave
//! no state behind; everything else is an infrastructure failure.

use fabric::{ControllerError, FabricError, NfRuntimeError};
use hlgraph::{EndpointId, FlowId, GraphError, GraphId};
use lsi::LsiError;
use thiserror::Error;

use crate::translator::TranslationError;

/// A reason for a graph not to be admissible on this node
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Violation {
    #[error("physical port {0} does not exist")]
    UnknownPhysicalPort(String),
    #[error("endpoint {0} does not exist")]
    UnknownEndpoint(EndpointId),
    #[error("endpoint {0} is matched but its graph sends no traffic to it")]
    EndpointNotDefinedInAction(EndpointId),
    #[error("endpoint {0} is an action but its graph does not match on it")]
    EndpointNotDefinedInMatch(EndpointId),
    #[error("network function {0} is unknown")]
    UnknownNetworkFunction(String),
}

fn fmt_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Rejection {
    #[error("graph {0} already exists")]
    GraphExists(GraphId),
    #[error("graph is not valid: {}", fmt_violations(.0))]
    Invalid(Vec<Violation>),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("network function {nf} exists and cannot get the new port {port}")]
    NewNfPort { nf: String, port: u32 },
    #[error("endpoint {endpoint} is still used by {users} other graph(s)")]
    EndpointInUse { endpoint: EndpointId, users: u32 },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum GraphManagerError {
    #[error("Request rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("Graph {0} does not exist")]
    NoSuchGraph(GraphId),
    #[error("Flow {1} does not exist in graph {0}")]
    NoSuchFlow(GraphId, FlowId),
    #[error(transparent)]
    Fabric(#[from] FabricError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    NfRuntime(#[from] NfRuntimeError),
    #[error("Failed to select the implementation of network functions")]
    NfSelection,
    #[error("Network functions failed to start: {}", .0.join(", "))]
    NfStart(Vec<String>),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Lsi(#[from] LsiError),
    #[error("No port left for the controller of a new switch")]
    ControllerPortsExhausted,
    #[error("Failed to attach wireless interface {0}")]
    WirelessAttach(String),
    #[error("Failed to serialize graph {0}: {1}")]
    Serialization(GraphId, String),
}

impl From<GraphError> for GraphManagerError {
    fn from(value: GraphError) -> Self {
        GraphManagerError::Rejected(Rejection::Graph(value))
    }
}

impl GraphManagerError {
    /// Tell if the error comes from the infrastructure rather than from the request
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            GraphManagerError::Rejected(_)
                | GraphManagerError::NoSuchGraph(_)
                | GraphManagerError::NoSuchFlow(..)
        )
    }
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, GraphManagerError::Rejected(_))
    }
}

pub type GraphManagerResult<T> = Result<T, GraphManagerError>;
