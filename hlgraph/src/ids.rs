// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Identifiers of graphs, flows, endpoints and network function ports

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::errors::GraphError;

/// Identity of a service graph. Graph ids are unique within the process.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GraphId(String);

impl GraphId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for GraphId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
impl Display for GraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a rule, unique within its graph.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for FlowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
impl Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named attachment point exported by one graph (the definer) so that other graphs can
/// reference it. The identity is global: `graph:name`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointId {
    graph: GraphId,
    name: String,
}

impl EndpointId {
    #[must_use]
    pub fn new(graph: impl Into<GraphId>, name: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            name: name.into(),
        }
    }
    /// The graph that defines this endpoint
    #[must_use]
    pub fn graph(&self) -> &GraphId {
        &self.graph
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl From<String> for GraphId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.graph, self.name)
    }
}
impl FromStr for EndpointId {
    type Err = GraphError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((graph, name)) if !graph.is_empty() && !name.is_empty() => {
                Ok(EndpointId::new(graph, name))
            }
            _ => Err(GraphError::BadEndpointId(s.to_owned())),
        }
    }
}
impl TryFrom<String> for EndpointId {
    type Error = GraphError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        EndpointId::from_str(&value)
    }
}
impl From<EndpointId> for String {
    fn from(value: EndpointId) -> Self {
        value.to_string()
    }
}

/// A port of a network function, as indexed by the graph
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct NfPort {
    pub nf: String,
    pub port: u32,
}

impl NfPort {
    #[must_use]
    pub fn new(nf: impl Into<String>, port: u32) -> Self {
        Self {
            nf: nf.into(),
            port,
        }
    }
}
impl Display for NfPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.nf, self.port)
    }
}
