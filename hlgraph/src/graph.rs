// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The high-level graph: rules plus the physical ports, network functions and endpoints
//! they refer to.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::errors::GraphError;
use crate::ids::{EndpointId, FlowId, GraphId, NfPort};
use crate::nf::{NetworkFunction, PortRequirements};
use crate::rule::{Anchor, Rule};

/// What was taken out of a graph by [`Graph::remove_rule`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedRule {
    pub rule: Rule,
    /// Network functions the graph no longer refers to
    pub gone_nfs: Vec<String>,
    /// Physical ports the graph no longer refers to
    pub gone_ports: Vec<String>,
    /// Endpoints the graph no longer refers to
    pub gone_endpoints: Vec<EndpointId>,
}

impl RemovedRule {
    #[must_use]
    pub fn action_nf_port(&self) -> Option<&NfPort> {
        self.rule.action.as_nf_port()
    }
    #[must_use]
    pub fn action_port(&self) -> Option<&str> {
        self.rule.action.as_port()
    }
    #[must_use]
    pub fn action_endpoint(&self) -> Option<&EndpointId> {
        self.rule.action.as_endpoint()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Graph {
    id: GraphId,
    rules: BTreeMap<FlowId, Rule>,
    ports: BTreeSet<String>,
    network_functions: BTreeMap<String, NetworkFunction>,
    endpoints: BTreeSet<EndpointId>,
}

impl Graph {
    #[must_use]
    pub fn new(id: impl Into<GraphId>) -> Self {
        Self {
            id: id.into(),
            rules: BTreeMap::new(),
            ports: BTreeSet::new(),
            network_functions: BTreeMap::new(),
            endpoints: BTreeSet::new(),
        }
    }
    #[must_use]
    pub fn id(&self) -> &GraphId {
        &self.id
    }

    pub fn add_port(&mut self, port: impl Into<String>) {
        self.ports.insert(port.into());
    }
    pub fn add_network_function(&mut self, name: impl Into<String>) -> &mut NetworkFunction {
        let name = name.into();
        self.network_functions
            .entry(name.clone())
            .or_insert_with(|| NetworkFunction::new(name))
    }
    /// Add a network function with all of its ports. Fails if the graph already has it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateNetworkFunction`] if a function with that name exists.
    pub fn insert_network_function(&mut self, nf: NetworkFunction) -> Result<(), GraphError> {
        if self.network_functions.contains_key(&nf.name) {
            return Err(GraphError::DuplicateNetworkFunction(nf.name));
        }
        self.network_functions.insert(nf.name.clone(), nf);
        Ok(())
    }
    pub fn add_nf_port(
        &mut self,
        name: impl Into<String>,
        port: u32,
        requirements: Option<PortRequirements>,
    ) {
        self.add_network_function(name).add_port(port, requirements);
    }
    pub fn add_endpoint(&mut self, endpoint: EndpointId) {
        self.endpoints.insert(endpoint);
    }

    #[must_use]
    pub fn ports(&self) -> &BTreeSet<String> {
        &self.ports
    }
    #[must_use]
    pub fn network_functions(&self) -> &BTreeMap<String, NetworkFunction> {
        &self.network_functions
    }
    #[must_use]
    pub fn network_function(&self, name: &str) -> Option<&NetworkFunction> {
        self.network_functions.get(name)
    }
    #[must_use]
    pub fn nf_requirements(&self, name: &str) -> Option<&BTreeMap<u32, PortRequirements>> {
        self.network_functions.get(name).map(|nf| &nf.ports)
    }
    #[must_use]
    pub fn endpoints(&self) -> &BTreeSet<EndpointId> {
        &self.endpoints
    }
    #[must_use]
    pub fn contains_nf(&self, name: &str) -> bool {
        self.network_functions.contains_key(name)
    }
    #[must_use]
    pub fn contains_port(&self, port: &str) -> bool {
        self.ports.contains(port)
    }
    #[must_use]
    pub fn contains_endpoint(&self, endpoint: &EndpointId) -> bool {
        self.endpoints.contains(endpoint)
    }
    /// Tell if an endpoint is exported by this graph (as opposed to referenced from another one)
    #[must_use]
    pub fn is_defined_here(&self, endpoint: &EndpointId) -> bool {
        endpoint.graph() == &self.id
    }
    /// Endpoints this graph refers to but does not define
    pub fn referenced_endpoints(&self) -> impl Iterator<Item = &EndpointId> {
        self.endpoints.iter().filter(|ep| !self.is_defined_here(ep))
    }
    /// Endpoints this graph defines
    pub fn defined_endpoints(&self) -> impl Iterator<Item = &EndpointId> {
        self.endpoints.iter().filter(|ep| self.is_defined_here(ep))
    }
    #[must_use]
    pub fn endpoint_used_in_match(&self, endpoint: &EndpointId) -> bool {
        self.rules
            .values()
            .any(|rule| rule.matched().as_endpoint() == Some(endpoint))
    }
    #[must_use]
    pub fn endpoint_used_in_action(&self, endpoint: &EndpointId) -> bool {
        self.rules
            .values()
            .any(|rule| rule.action.as_endpoint() == Some(endpoint))
    }

    fn check_rule(&self, rule: &Rule) -> Result<(), GraphError> {
        if self.rules.contains_key(&rule.id) {
            return Err(GraphError::DuplicateFlow(rule.id.clone()));
        }
        match (rule.matched(), &rule.action) {
            (Anchor::None, _) => return Err(GraphError::UnanchoredMatch(rule.id.clone())),
            (Anchor::NetworkFunction(_), Anchor::Endpoint(_)) => {}
            (_, Anchor::Endpoint(ep)) => {
                return Err(GraphError::EndpointActionNotFromNf(
                    rule.id.clone(),
                    ep.clone(),
                ));
            }
            _ => {}
        }
        if let Anchor::Endpoint(ep) = rule.matched()
            && self.is_defined_here(ep)
        {
            if rule.action.as_nf_port().is_none() {
                return Err(GraphError::LocalEndpointNotToNf(rule.id.clone(), ep.clone()));
            }
            if self.endpoint_used_in_match(ep) {
                return Err(GraphError::LocalEndpointMatchedTwice(ep.clone()));
            }
        }
        Ok(())
    }

    fn register(&mut self, anchor: &Anchor) {
        match anchor {
            Anchor::Port(port) => self.add_port(port.clone()),
            Anchor::NetworkFunction(nfport) => self.add_nf_port(nfport.nf.clone(), nfport.port, None),
            Anchor::Endpoint(ep) => self.add_endpoint(ep.clone()),
            Anchor::None => {}
        }
    }

    /// Add a rule, registering the entities it refers to.
    ///
    /// # Errors
    ///
    /// Fails if the flow id is taken or if the rule shape is not admissible.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), GraphError> {
        self.check_rule(&rule)?;
        self.register(&rule.r#match.on);
        self.register(&rule.action);
        debug!("Graph {}: added {rule}", self.id);
        self.rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    #[must_use]
    pub fn rule(&self, flow: &FlowId) -> Option<&Rule> {
        self.rules.get(flow)
    }
    #[must_use]
    pub fn contains_rule(&self, flow: &FlowId) -> bool {
        self.rules.contains_key(flow)
    }
    #[must_use]
    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }
    /// The endpoint a flow refers to, if any. Admissible rules refer to at most one.
    #[must_use]
    pub fn endpoint_involved(&self, flow: &FlowId) -> Option<&EndpointId> {
        self.rules.get(flow).and_then(|rule| rule.endpoints().next())
    }

    fn anchor_still_used(&self, anchor: &Anchor) -> bool {
        self.rules
            .values()
            .any(|rule| rule.matched() == anchor || &rule.action == anchor)
    }
    fn nf_still_used(&self, nf: &str) -> bool {
        self.rules.values().any(|rule| {
            rule.matched().as_nf_port().is_some_and(|p| p.nf == nf)
                || rule.action.as_nf_port().is_some_and(|p| p.nf == nf)
        })
    }

    /// Remove a rule. Ports, network functions and endpoints that no remaining rule refers to
    /// are removed as well and reported in the result.
    pub fn remove_rule(&mut self, flow: &FlowId) -> Option<RemovedRule> {
        let rule = self.rules.remove(flow)?;
        let mut removed = RemovedRule {
            rule,
            gone_nfs: vec![],
            gone_ports: vec![],
            gone_endpoints: vec![],
        };
        for anchor in [removed.rule.r#match.on.clone(), removed.rule.action.clone()] {
            match &anchor {
                Anchor::Port(port) if !self.anchor_still_used(&anchor) => {
                    if self.ports.remove(port) {
                        removed.gone_ports.push(port.clone());
                    }
                }
                Anchor::NetworkFunction(nfport) if !self.nf_still_used(&nfport.nf) => {
                    if self.network_functions.remove(&nfport.nf).is_some() {
                        removed.gone_nfs.push(nfport.nf.clone());
                    }
                }
                Anchor::Endpoint(ep) if !self.anchor_still_used(&anchor) => {
                    if self.endpoints.remove(ep) {
                        removed.gone_endpoints.push(ep.clone());
                    }
                }
                _ => {}
            }
        }
        debug!("Graph {}: removed {}", self.id, removed.rule);
        Some(removed)
    }

    /// Merge another graph into this one. The rules of `piece` must not collide with the
    /// ones already present.
    ///
    /// # Errors
    ///
    /// Fails on the first rule of `piece` that cannot be added. The graph may have been
    /// partially extended in that case, so callers should merge into a copy.
    pub fn merge(&mut self, piece: &Graph) -> Result<(), GraphError> {
        for nf in piece.network_functions.values() {
            let ours = self.add_network_function(nf.name.clone());
            for (port, requirements) in &nf.ports {
                if !ours.has_port(*port) {
                    ours.add_port(*port, Some(requirements.clone()));
                }
            }
        }
        self.ports.extend(piece.ports.iter().cloned());
        self.endpoints.extend(piece.endpoints.iter().cloned());
        for rule in piece.rules.values() {
            self.add_rule(rule.clone())?;
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::graph::Graph;
    use crate::ids::EndpointId;
    use crate::rule::{Anchor, Rule};
    use bolero::{Driver, TypeGenerator};

    const PORTS: [&str; 3] = ["eth0", "eth1", "eth2"];
    const NFS: [&str; 3] = ["nf0", "nf1", "nf2"];

    fn anchor<D: Driver>(driver: &mut D) -> Option<Anchor> {
        let choice = driver.produce::<u8>()? % 4;
        let index = usize::from(driver.produce::<u8>()? % 3);
        Some(match choice {
            0 => Anchor::port(PORTS[index]),
            1 => Anchor::nf(NFS[index], u32::from(driver.produce::<u8>()? % 3)),
            2 => {
                let graph = if driver.produce::<bool>()? { "g0" } else { "peer" };
                Anchor::endpoint(EndpointId::new(graph, format!("ep{index}")))
            }
            _ => Anchor::None,
        })
    }

    /// Generates admissible graphs named `g0`: candidate rules that would be rejected are
    /// skipped.
    impl TypeGenerator for Graph {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            let mut graph = Graph::new("g0");
            let num_rules = driver.produce::<u8>()? % 12;
            for n in 0..num_rules {
                let rule = Rule::new(n.to_string().as_str(), anchor(driver)?, anchor(driver)?);
                let _ = graph.add_rule(rule);
            }
            Some(graph)
        }
    }
}
