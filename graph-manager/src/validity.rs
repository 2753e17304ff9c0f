// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Admission of graphs: a graph, or the part an update adds to one, may only refer to
//! physical ports switch-0 has, endpoints other graphs publish and network functions the
//! runtime knows.

use fabric::{Description, NfRuntime, NfRuntimeError};
use hlgraph::{EndpointId, Graph};
use lsi::Lsi;
use std::collections::BTreeSet;
use tracing::debug;

use crate::errors::{Rejection, Violation};
use crate::registry::EndpointRegistry;

/// The entities a request introduces
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    pub ports: BTreeSet<String>,
    pub endpoints: BTreeSet<EndpointId>,
    pub nfs: BTreeSet<String>,
}

impl Delta {
    /// Everything in a graph is new
    #[must_use]
    pub fn full(graph: &Graph) -> Self {
        Self {
            ports: graph.ports().iter().cloned().collect(),
            endpoints: graph.endpoints().iter().cloned().collect(),
            nfs: graph.network_functions().keys().cloned().collect(),
        }
    }

    /// What `piece` adds to `graph`. Network functions are immutable once deployed, so an
    /// existing function showing up with a port it did not have is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::NewNfPort`] on the first new port of an existing function.
    pub fn between(graph: &Graph, piece: &Graph) -> Result<Self, Rejection> {
        let mut delta = Delta::default();
        for (name, nf) in piece.network_functions() {
            match graph.network_function(name) {
                Some(existing) => {
                    if let Some(port) = nf.ports.keys().find(|p| !existing.has_port(**p)) {
                        return Err(Rejection::NewNfPort {
                            nf: name.clone(),
                            port: *port,
                        });
                    }
                }
                None => {
                    delta.nfs.insert(name.clone());
                }
            }
        }
        delta.ports = piece
            .ports()
            .iter()
            .filter(|p| !graph.contains_port(p))
            .cloned()
            .collect();
        delta.endpoints = piece
            .endpoints()
            .iter()
            .filter(|ep| !graph.contains_endpoint(ep))
            .cloned()
            .collect();
        Ok(delta)
    }

    /// New endpoints that `graph` refers to but does not define
    pub fn referenced_endpoints<'a>(
        &'a self,
        graph: &'a Graph,
    ) -> impl Iterator<Item = &'a EndpointId> {
        self.endpoints.iter().filter(|ep| !graph.is_defined_here(ep))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty() && self.endpoints.is_empty() && self.nfs.is_empty()
    }
}

/// Check the physical ports of `delta`, and the endpoints of other graphs the rules of `graph`
/// use. An endpoint a graph already refers to is checked again, since new rules may use it in
/// the other direction.
#[must_use]
pub fn check_resources(
    graph: &Graph,
    delta: &Delta,
    lsi0: &Lsi,
    registry: &EndpointRegistry,
) -> Vec<Violation> {
    let mut violations = vec![];
    for port in &delta.ports {
        if lsi0.physical_port(port).is_none() {
            violations.push(Violation::UnknownPhysicalPort(port.clone()));
        }
    }
    for endpoint in graph.referenced_endpoints() {
        if !registry.contains(endpoint) {
            violations.push(Violation::UnknownEndpoint(endpoint.clone()));
            continue;
        }
        if graph.endpoint_used_in_match(endpoint) && registry.action_port(endpoint).is_none() {
            violations.push(Violation::EndpointNotDefinedInAction(endpoint.clone()));
        }
        if graph.endpoint_used_in_action(endpoint) && registry.match_port(endpoint).is_none() {
            violations.push(Violation::EndpointNotDefinedInMatch(endpoint.clone()));
        }
    }
    violations
}

/// Check that the runtime can provide the network functions of `delta`
///
/// # Errors
///
/// Fails if the runtime could not be queried, which is not a property of the graph.
pub async fn check_network_functions(
    delta: &Delta,
    runtime: &dyn NfRuntime,
) -> Result<Vec<Violation>, NfRuntimeError> {
    let mut violations = vec![];
    for nf in &delta.nfs {
        match runtime.retrieve_description(nf).await? {
            Description::Found { implementations } => {
                debug!("Network function {nf} has implementations {implementations:?}");
            }
            Description::NotFound => violations.push(Violation::UnknownNetworkFunction(nf.clone())),
        }
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric::NfRuntimeFactory;
    use fabric::sim::SimNfRuntimes;
    use hlgraph::{Anchor, Rule};
    use lsi::{ControllerAddr, Dpid, LsiSpecBuilder, NfType, SwitchLayout};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn ep(s: &str) -> EndpointId {
        s.parse().expect("Should succeed")
    }

    fn lsi0() -> Lsi {
        let spec = LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", 6653))
            .physical_ports(BTreeMap::from([("eth0".to_owned(), "ethernet".to_owned())]))
            .wireless(Some("wlan0".to_owned()))
            .build()
            .expect("Should succeed");
        let layout = SwitchLayout {
            dpid: Dpid(1),
            physical_ports: BTreeMap::from([("eth0".to_owned(), 1)]),
            wireless_port: Some(2),
            ..Default::default()
        };
        Lsi::from_layout(&spec, layout).expect("Should succeed")
    }

    fn graph() -> Graph {
        let mut graph = Graph::new("g2");
        for rule in [
            Rule::new("1", Anchor::port("eth0"), Anchor::nf("fw", 1)),
            Rule::new("2", Anchor::port("wlan0"), Anchor::nf("fw", 1)),
            Rule::new("3", Anchor::port("eth9"), Anchor::nf("fw", 1)),
            Rule::new("4", Anchor::endpoint(ep("g1:in")), Anchor::nf("fw", 1)),
            Rule::new("5", Anchor::nf("fw", 2), Anchor::endpoint(ep("g1:out"))),
            Rule::new("6", Anchor::nf("fw", 2), Anchor::endpoint(ep("g3:nope"))),
        ] {
            graph.add_rule(rule).expect("Should succeed");
        }
        graph
    }

    #[test]
    fn test_check_resources() {
        let mut registry = EndpointRegistry::new();
        // both published the wrong way round
        registry.publish_in_match(&ep("g1:in"), 5);
        registry.publish_in_action(&ep("g1:out"), 6);

        let graph = graph();
        let violations = check_resources(&graph, &Delta::full(&graph), &lsi0(), &registry);
        assert_eq!(
            violations,
            vec![
                Violation::UnknownPhysicalPort("eth9".to_owned()),
                Violation::EndpointNotDefinedInAction(ep("g1:in")),
                Violation::EndpointNotDefinedInMatch(ep("g1:out")),
                Violation::UnknownEndpoint(ep("g3:nope")),
            ]
        );

        registry.publish_in_action(&ep("g1:in"), 7);
        registry.publish_in_match(&ep("g1:out"), 8);
        let violations = check_resources(&graph, &Delta::full(&graph), &lsi0(), &registry);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_known_endpoint_used_the_other_way() {
        let mut registry = EndpointRegistry::new();
        registry.publish_in_action(&ep("g1:x"), 5);
        let mut graph = Graph::new("g2");
        for rule in [
            Rule::new("1", Anchor::endpoint(ep("g1:x")), Anchor::nf("nat", 1)),
            Rule::new("2", Anchor::nf("nat", 2), Anchor::port("eth0")),
        ] {
            graph.add_rule(rule).expect("Should succeed");
        }
        let mut piece = Graph::new("g2");
        piece
            .add_rule(Rule::new("3", Anchor::nf("nat", 2), Anchor::endpoint(ep("g1:x"))))
            .expect("Should succeed");

        let delta = Delta::between(&graph, &piece).expect("Should succeed");
        assert!(delta.endpoints.is_empty());
        assert_eq!(
            check_resources(&piece, &delta, &lsi0(), &registry),
            vec![Violation::EndpointNotDefinedInMatch(ep("g1:x"))]
        );

        registry.publish_in_match(&ep("g1:x"), 6);
        assert!(check_resources(&piece, &delta, &lsi0(), &registry).is_empty());
    }

    #[test]
    fn test_delta_between() {
        let graph = graph();
        let mut piece = Graph::new("g2");
        piece
            .add_rule(Rule::new("10", Anchor::nf("fw", 1), Anchor::nf("nat", 1)))
            .expect("Should succeed");
        let delta = Delta::between(&graph, &piece).expect("Should succeed");
        assert_eq!(delta.nfs, BTreeSet::from(["nat".to_owned()]));
        assert!(delta.ports.is_empty());

        let mut piece = Graph::new("g2");
        piece
            .add_rule(Rule::new("10", Anchor::port("eth0"), Anchor::nf("fw", 3)))
            .expect("Should succeed");
        assert_eq!(
            Delta::between(&graph, &piece),
            Err(Rejection::NewNfPort {
                nf: "fw".to_owned(),
                port: 3
            })
        );
    }

    #[tokio::test]
    async fn test_check_network_functions() {
        let runtimes = SimNfRuntimes::new(&[("fw", NfType::Docker)]);
        let runtime = runtimes.runtime();
        let mut delta = Delta::default();
        delta.nfs.insert("fw".to_owned());
        delta.nfs.insert("ghost".to_owned());
        let violations = check_network_functions(&delta, runtime.as_ref())
            .await
            .expect("Should succeed");
        assert_eq!(
            violations,
            vec![Violation::UnknownNetworkFunction("ghost".to_owned())]
        );

        runtimes.set_unreachable(true);
        assert!(check_network_functions(&delta, runtime.as_ref()).await.is_err());
    }
}
