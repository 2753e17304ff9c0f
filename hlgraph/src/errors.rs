// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors in the construction of high-level graphs

use thiserror::Error;

use crate::ids::{EndpointId, FlowId, GraphId};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum GraphError {
    #[error("Bad endpoint id '{0}': expected 'graph:name'")]
    BadEndpointId(String),
    #[error("Flow {0} already exists")]
    DuplicateFlow(FlowId),
    #[error("Flow {0} has no match anchor")]
    UnanchoredMatch(FlowId),
    #[error("Flow {0} outputs to endpoint {1} but does not match on a network function")]
    EndpointActionNotFromNf(FlowId, EndpointId),
    #[error("Flow {0} matches on endpoint {1}, defined by this graph, but does not feed a network function")]
    LocalEndpointNotToNf(FlowId, EndpointId),
    #[error("Endpoint {0}, defined by this graph, is matched by more than one flow")]
    LocalEndpointMatchedTwice(EndpointId),
    #[error("Network function {0} appears more than once")]
    DuplicateNetworkFunction(String),
    #[error("Document is for graph {0} but was submitted as {1}")]
    GraphIdMismatch(GraphId, GraphId),
}
