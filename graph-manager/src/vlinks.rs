// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Planning and allocation of the virtual links between a tenant switch and switch-0.
//!
//! Traffic towards a network function enters the tenant switch through a link and traffic
//! towards a physical port leaves it through one. As those go in opposite directions, the
//! n-th network function port and the n-th physical port share the n-th link. Each endpoint
//! the graph sends traffic to gets a link of its own.

use fabric::SwitchFabric;
use hlgraph::{Anchor, EndpointId, Graph, NfPort};
use lsi::{Dpid, Lsi, LsiError, VLinkId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, warn};

use crate::errors::GraphManagerResult;
use crate::registry::EndpointRegistry;
use crate::translator::TranslationError;

/// What needs a virtual link in a graph, or in the rules an update adds to it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VlinkPlan {
    /// Network function ports receiving traffic from a physical port or an endpoint
    pub nfs: BTreeSet<NfPort>,
    /// Physical ports receiving traffic from a network function
    pub ports: BTreeSet<String>,
    /// Endpoints receiving traffic from a network function
    pub endpoints: BTreeSet<EndpointId>,
}

impl VlinkPlan {
    /// Collect what the rules of `graph` need. Anything `bound` already has a link for is
    /// left out.
    #[must_use]
    pub fn identify(graph: &Graph, bound: Option<&Lsi>) -> Self {
        let mut plan = VlinkPlan::default();
        for rule in graph.rules() {
            match (rule.matched(), &rule.action) {
                (Anchor::Port(_) | Anchor::Endpoint(_), Anchor::NetworkFunction(nfport)) => {
                    if bound.is_none_or(|lsi| lsi.nf_vlink(nfport).is_none()) {
                        plan.nfs.insert(nfport.clone());
                    }
                }
                (Anchor::NetworkFunction(_), Anchor::Port(port)) => {
                    if bound.is_none_or(|lsi| lsi.port_vlink(port).is_none()) {
                        plan.ports.insert(port.clone());
                    }
                }
                (Anchor::NetworkFunction(_), Anchor::Endpoint(endpoint)) => {
                    if bound.is_none_or(|lsi| lsi.endpoint_vlink(endpoint).is_none()) {
                        plan.endpoints.insert(endpoint.clone());
                    }
                }
                _ => {}
            }
        }
        plan
    }

    fn shared(&self) -> usize {
        self.nfs.len().max(self.ports.len())
    }

    /// Number of links the plan needs
    #[must_use]
    pub fn required(&self) -> usize {
        self.shared() + self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required() == 0
    }

    /// Bind the links of the switch, in the order they were created, to what needs them.
    ///
    /// # Errors
    ///
    /// Fails if there are fewer links than needed or if a link is unknown to the switch.
    pub fn bind(&self, lsi: &mut Lsi, links: &[VLinkId]) -> Result<(), LsiError> {
        if links.len() < self.required() {
            return Err(LsiError::MissingVLinks {
                expected: self.required(),
                got: links.len(),
            });
        }
        for (nfport, id) in self.nfs.iter().zip(links) {
            lsi.bind_nf(nfport.clone(), *id)?;
        }
        for (port, id) in self.ports.iter().zip(links) {
            lsi.bind_port(port, *id)?;
        }
        for (endpoint, id) in self.endpoints.iter().zip(&links[self.shared()..]) {
            lsi.bind_endpoint(endpoint.clone(), *id)?;
        }
        if links.len() > self.required() {
            warn!(
                "Switch {}: {} virtual link(s) left unused",
                lsi.dpid(),
                links.len() - self.required()
            );
        }
        Ok(())
    }

    /// Create the links of the plan from the switch to `peer` and bind them. Either all links
    /// are created or none is left behind.
    ///
    /// # Errors
    ///
    /// Fails if the fabric fails to create a link.
    pub async fn allocate(
        &self,
        fabric: &dyn SwitchFabric,
        lsi: &mut Lsi,
        peer: Dpid,
    ) -> GraphManagerResult<Vec<VLinkId>> {
        let dpid = lsi.dpid();
        let mut created = Vec::with_capacity(self.required());
        for _ in 0..self.required() {
            match fabric.create_virtual_link(dpid, peer).await {
                Ok(vlink) => {
                    debug!("Switch {dpid}: created {vlink}");
                    created.push(vlink);
                }
                Err(e) => {
                    error!("Switch {dpid}: failed to create virtual link: {e}");
                    let ids: Vec<VLinkId> = created.iter().map(|v| v.id).collect();
                    destroy_vlinks(fabric, dpid, &ids).await;
                    return Err(e.into());
                }
            }
        }
        let ids: Vec<VLinkId> = created.iter().map(|v| v.id).collect();
        let mut working = lsi.clone();
        let outcome = created
            .into_iter()
            .try_for_each(|vlink| working.add_vlink(vlink))
            .and_then(|()| self.bind(&mut working, &ids));
        if let Err(e) = outcome {
            destroy_vlinks(fabric, dpid, &ids).await;
            return Err(e.into());
        }
        *lsi = working;
        Ok(ids)
    }
}

/// Destroy links of a switch, logging failures
pub async fn destroy_vlinks(fabric: &dyn SwitchFabric, dpid: Dpid, ids: &[VLinkId]) {
    for id in ids {
        if let Err(e) = fabric.destroy_virtual_link(dpid, *id).await {
            error!("Switch {dpid}: failed to destroy {id}: {e}");
        }
    }
}

/// A port of switch-0 through which an endpoint a graph defines is reached
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Publication {
    /// Traffic to the endpoint is to be sent to this port
    InMatch(EndpointId, u32),
    /// Traffic from the endpoint arrives on this port
    InAction(EndpointId, u32),
}

impl Publication {
    pub fn apply(&self, registry: &mut EndpointRegistry) {
        match self {
            Publication::InMatch(endpoint, port) => registry.publish_in_match(endpoint, *port),
            Publication::InAction(endpoint, port) => registry.publish_in_action(endpoint, *port),
        }
    }
}

/// Compute what the given rules of `graph` publish for the endpoints the graph defines
///
/// # Errors
///
/// Fails if a rule has no link bound on the switch.
pub fn publications<'r>(
    graph: &Graph,
    rules: impl IntoIterator<Item = &'r hlgraph::Rule>,
    lsi: &Lsi,
) -> Result<Vec<Publication>, TranslationError> {
    let mut out = BTreeMap::new();
    for rule in rules {
        match (rule.matched(), &rule.action) {
            (Anchor::NetworkFunction(_), Anchor::Endpoint(endpoint))
                if graph.is_defined_here(endpoint) =>
            {
                let vlink = lsi.endpoint_vlink(endpoint).ok_or_else(|| {
                    TranslationError::MissingBinding(rule.id.clone(), endpoint.to_string())
                })?;
                out.insert(
                    (endpoint.clone(), false),
                    Publication::InAction(endpoint.clone(), vlink.remote_port),
                );
            }
            (Anchor::Endpoint(endpoint), Anchor::NetworkFunction(nfport))
                if graph.is_defined_here(endpoint) =>
            {
                let vlink = lsi.nf_vlink(nfport).ok_or_else(|| {
                    TranslationError::MissingBinding(rule.id.clone(), nfport.to_string())
                })?;
                out.insert(
                    (endpoint.clone(), true),
                    Publication::InMatch(endpoint.clone(), vlink.remote_port),
                );
            }
            _ => {}
        }
    }
    Ok(out.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric::sim::SimFabric;
    use hlgraph::Rule;
    use lsi::{ControllerAddr, LsiSpec, LsiSpecBuilder};
    use pretty_assertions::assert_eq;

    fn ep(s: &str) -> EndpointId {
        s.parse().expect("Should succeed")
    }

    fn graph(rules: Vec<Rule>) -> Graph {
        let mut graph = Graph::new("g1");
        for rule in rules {
            graph.add_rule(rule).expect("Should succeed");
        }
        graph
    }

    fn spec(port: u16) -> LsiSpec {
        LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", port))
            .build()
            .expect("Should succeed")
    }

    #[test]
    fn test_identify() {
        let graph = graph(vec![
            Rule::new("1", Anchor::port("eth0"), Anchor::nf("fw", 1)),
            Rule::new("2", Anchor::nf("fw", 2), Anchor::port("eth1")),
            Rule::new("3", Anchor::nf("fw", 2), Anchor::port("eth2")),
            Rule::new("4", Anchor::nf("fw", 2), Anchor::port("eth3")),
            Rule::new("5", Anchor::endpoint(ep("g1:in")), Anchor::nf("fw", 1)),
            Rule::new("6", Anchor::nf("fw", 1), Anchor::endpoint(ep("g1:out"))),
            Rule::new("7", Anchor::nf("fw", 1), Anchor::nf("fw", 2)),
            Rule::new("8", Anchor::port("eth0"), Anchor::port("eth1")),
        ]);
        let plan = VlinkPlan::identify(&graph, None);
        assert_eq!(plan.nfs, BTreeSet::from([NfPort::new("fw", 1)]));
        assert_eq!(plan.ports.len(), 3);
        assert_eq!(plan.endpoints, BTreeSet::from([ep("g1:out")]));
        assert_eq!(plan.required(), 4);
    }

    #[test]
    fn test_identify_skips_bound() {
        let graph = graph(vec![
            Rule::new("1", Anchor::port("eth0"), Anchor::nf("fw", 1)),
            Rule::new("2", Anchor::nf("fw", 1), Anchor::port("eth1")),
        ]);
        let mut lsi = Lsi::from_layout(
            &spec(6654),
            lsi::SwitchLayout {
                dpid: Dpid(2),
                vlinks: vec![lsi::VLink::new(VLinkId(1), 1, Dpid(1), 1)],
                ..Default::default()
            },
        )
        .expect("Should succeed");
        lsi.bind_nf(NfPort::new("fw", 1), VLinkId(1)).expect("Should succeed");
        let plan = VlinkPlan::identify(&graph, Some(&lsi));
        assert!(plan.nfs.is_empty());
        assert_eq!(plan.ports, BTreeSet::from(["eth1".to_owned()]));
    }

    #[tokio::test]
    async fn test_allocate_and_publish() {
        let fabric = SimFabric::new(&[("eth0", "ethernet")]);
        let lsi0 = fabric.create_switch(&spec(6653)).await.expect("Should succeed");
        let layout = fabric.create_switch(&spec(6654)).await.expect("Should succeed");
        let mut lsi = Lsi::from_layout(&spec(6654), layout).expect("Should succeed");

        let graph = graph(vec![
            Rule::new("1", Anchor::endpoint(ep("g1:in")), Anchor::nf("fw", 1)),
            Rule::new("2", Anchor::nf("fw", 1), Anchor::port("eth0")),
            Rule::new("3", Anchor::nf("fw", 1), Anchor::endpoint(ep("g1:out"))),
        ]);
        let plan = VlinkPlan::identify(&graph, None);
        let ids = plan
            .allocate(&fabric, &mut lsi, lsi0.dpid)
            .await
            .expect("Should succeed");
        assert_eq!(ids.len(), 2);
        assert_eq!(fabric.num_vlinks(lsi.dpid()), 2);
        // the network function and the port share the first link
        assert_eq!(lsi.nf_vlinks().get(&NfPort::new("fw", 1)), Some(&ids[0]));
        assert_eq!(lsi.port_vlinks().get("eth0"), Some(&ids[0]));
        assert_eq!(lsi.endpoint_vlinks().get(&ep("g1:out")), Some(&ids[1]));

        let publications = publications(&graph, graph.rules(), &lsi).expect("Should succeed");
        let remote = |id: VLinkId| lsi.vlink(id).map(|v| v.remote_port).expect("Should succeed");
        assert_eq!(
            publications,
            vec![
                Publication::InMatch(ep("g1:in"), remote(ids[0])),
                Publication::InAction(ep("g1:out"), remote(ids[1])),
            ]
        );
    }

    #[tokio::test]
    async fn test_allocate_is_all_or_nothing() {
        let fabric = SimFabric::new(&[]);
        let lsi0 = fabric.create_switch(&spec(6653)).await.expect("Should succeed");
        let layout = fabric.create_switch(&spec(6654)).await.expect("Should succeed");
        let mut lsi = Lsi::from_layout(&spec(6654), layout).expect("Should succeed");

        let graph = graph(vec![
            Rule::new("1", Anchor::nf("fw", 1), Anchor::endpoint(ep("g1:a"))),
            Rule::new("2", Anchor::nf("fw", 1), Anchor::endpoint(ep("g1:b"))),
            Rule::new("3", Anchor::nf("fw", 1), Anchor::endpoint(ep("g1:c"))),
        ]);
        fabric.fail_vlink_creation_after(2);
        let plan = VlinkPlan::identify(&graph, None);
        assert!(plan.allocate(&fabric, &mut lsi, lsi0.dpid).await.is_err());
        assert_eq!(fabric.num_vlinks(lsi.dpid()), 0);
        assert_eq!(fabric.num_peer_ports(lsi0.dpid), 0);
        assert_eq!(lsi.num_vlinks(), 0);
        assert!(lsi.endpoint_vlinks().is_empty());
    }

    #[test]
    fn test_plan_binds_every_rule() {
        bolero::check!().with_type().for_each(|graph: &Graph| {
            let plan = VlinkPlan::identify(graph, None);
            let vlinks = (1..=plan.required())
                .map(|n| {
                    let n = u32::try_from(n).expect("Should succeed");
                    lsi::VLink::new(VLinkId(u64::from(n)), n, Dpid(1), n + 100)
                })
                .collect::<Vec<_>>();
            let ids: Vec<VLinkId> = vlinks.iter().map(|v| v.id).collect();
            let layout = lsi::SwitchLayout {
                dpid: Dpid(2),
                vlinks,
                ..Default::default()
            };
            let mut lsi = Lsi::from_layout(&spec(6654), layout).expect("Should succeed");
            plan.bind(&mut lsi, &ids).expect("Should succeed");
            if let Some((_, fewer)) = ids.split_last() {
                assert!(plan.bind(&mut lsi.clone(), fewer).is_err());
            }
            for rule in graph.rules() {
                match (rule.matched(), &rule.action) {
                    (Anchor::Port(_) | Anchor::Endpoint(_), Anchor::NetworkFunction(n)) => {
                        assert!(lsi.nf_vlink(n).is_some());
                    }
                    (Anchor::NetworkFunction(_), Anchor::Port(p)) => {
                        assert!(lsi.port_vlink(p).is_some());
                    }
                    (Anchor::NetworkFunction(_), Anchor::Endpoint(e)) => {
                        assert!(lsi.endpoint_vlink(e).is_some());
                        // endpoint links are never shared
                        let id = lsi.endpoint_vlinks().get(e).copied();
                        assert!(!lsi.nf_vlinks().values().any(|v| Some(*v) == id));
                        assert!(!lsi.port_vlinks().values().any(|v| Some(*v) == id));
                    }
                    _ => {}
                }
            }
        });
    }
}
