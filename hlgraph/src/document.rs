// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Serialized form of a graph. A [`Graph`] is only ever built out of a document through
//! [`Graph::try_from`], so documents with inadmissible rules are refused at parse time.

use serde::{Deserialize, Serialize};

use crate::errors::GraphError;
use crate::graph::Graph;
use crate::ids::{EndpointId, GraphId};
use crate::nf::NetworkFunction;
use crate::rule::Rule;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GraphDocument {
    pub id: GraphId,
    #[serde(default)]
    pub network_functions: Vec<NetworkFunction>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointId>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl TryFrom<GraphDocument> for Graph {
    type Error = GraphError;
    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = Graph::new(doc.id);
        for nf in doc.network_functions {
            graph.insert_network_function(nf)?;
        }
        for port in doc.ports {
            graph.add_port(port);
        }
        for endpoint in doc.endpoints {
            graph.add_endpoint(endpoint);
        }
        for rule in doc.rules {
            graph.add_rule(rule)?;
        }
        Ok(graph)
    }
}

impl From<&Graph> for GraphDocument {
    fn from(graph: &Graph) -> Self {
        GraphDocument {
            id: graph.id().clone(),
            network_functions: graph.network_functions().values().cloned().collect(),
            ports: graph.ports().iter().cloned().collect(),
            endpoints: graph.endpoints().iter().cloned().collect(),
            rules: graph.rules().cloned().collect(),
        }
    }
}

impl From<Graph> for GraphDocument {
    fn from(graph: Graph) -> Self {
        GraphDocument::from(&graph)
    }
}

impl Serialize for Graph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GraphDocument::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Graph {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = GraphDocument::deserialize(deserializer)?;
        Graph::try_from(doc).map_err(serde::de::Error::custom)
    }
}
