// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Network functions of a high-level graph

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Addressing a network function asks for on one of its ports
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PortRequirements {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Net>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl PortRequirements {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.mac.is_none()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct NetworkFunction {
    pub name: String,
    /// Ports of the function, by the index the graph uses for them
    #[serde(default)]
    pub ports: BTreeMap<u32, PortRequirements>,
}

impl NetworkFunction {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: BTreeMap::new(),
        }
    }
    #[must_use]
    pub fn with_port(mut self, port: u32) -> Self {
        self.ports.entry(port).or_default();
        self
    }
    /// Register a port, keeping the requirements already known for it unless new ones are given
    pub fn add_port(&mut self, port: u32, requirements: Option<PortRequirements>) {
        match requirements {
            Some(requirements) => {
                self.ports.insert(port, requirements);
            }
            None => {
                self.ports.entry(port).or_default();
            }
        }
    }
    #[must_use]
    pub fn has_port(&self, port: u32) -> bool {
        self.ports.contains_key(&port)
    }
    #[must_use]
    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }
}
