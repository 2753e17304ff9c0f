// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Lowering of high-level rules into the flow rules of switch-0 and of the tenant switch.
//!
//! A rule involving a physical port or an endpoint of another graph needs a rule on switch-0,
//! a rule involving a network function needs one on the tenant switch, and virtual links carry
//! traffic between both. Rules on switch-0 are named `<graph>_<flow>` so that the rules of
//! all graphs can share one table.

use hlgraph::{Anchor, EndpointId, FlowId, Graph, GraphId, NfPort, Rule};
use lsi::{FlowRule, Lsi, LowAction, VLink};
use thiserror::Error;
use tracing::debug;

use crate::registry::EndpointRegistry;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TranslationError {
    #[error("Flow {0}: physical port {1} is not a port of switch-0")]
    UnknownPhysicalPort(FlowId, String),
    #[error("Flow {0}: network function port {1} has no switch port")]
    UnknownNfPort(FlowId, NfPort),
    #[error("Flow {0}: no virtual link carries traffic for {1}")]
    MissingBinding(FlowId, String),
    #[error("Flow {0}: endpoint {1} is not published by its graph")]
    UnpublishedEndpoint(FlowId, EndpointId),
    #[error("Flow {0} cannot be lowered")]
    Inadmissible(FlowId),
}

/// Name of the switch-0 rule derived from a flow of a graph
#[must_use]
pub fn lsi0_rule_id(graph: &GraphId, flow: &FlowId) -> String {
    format!("{graph}_{flow}")
}

/// The flow rules derived from one high-level rule
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lowered {
    pub lsi0: Option<FlowRule>,
    pub tenant: Option<FlowRule>,
}

/// The flow rules derived from a set of high-level rules, per switch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Translation {
    pub lsi0: Vec<FlowRule>,
    pub tenant: Vec<FlowRule>,
}

impl Translation {
    fn push(&mut self, lowered: Lowered) {
        self.lsi0.extend(lowered.lsi0);
        self.tenant.extend(lowered.tenant);
    }
}

pub struct Translator<'a> {
    graph: &'a Graph,
    tenant: &'a Lsi,
    lsi0: &'a Lsi,
    registry: &'a EndpointRegistry,
}

impl<'a> Translator<'a> {
    #[must_use]
    pub fn new(
        graph: &'a Graph,
        tenant: &'a Lsi,
        lsi0: &'a Lsi,
        registry: &'a EndpointRegistry,
    ) -> Self {
        Self {
            graph,
            tenant,
            lsi0,
            registry,
        }
    }

    fn phy(&self, flow: &FlowId, port: &str) -> Result<u32, TranslationError> {
        self.lsi0
            .physical_port(port)
            .ok_or_else(|| TranslationError::UnknownPhysicalPort(flow.clone(), port.to_owned()))
    }
    fn nf_port(&self, flow: &FlowId, nfport: &NfPort) -> Result<u32, TranslationError> {
        self.tenant
            .nf_port(nfport)
            .ok_or_else(|| TranslationError::UnknownNfPort(flow.clone(), nfport.clone()))
    }
    fn nf_vlink(&self, flow: &FlowId, nfport: &NfPort) -> Result<&'a VLink, TranslationError> {
        self.tenant
            .nf_vlink(nfport)
            .ok_or_else(|| TranslationError::MissingBinding(flow.clone(), nfport.to_string()))
    }
    fn port_vlink(&self, flow: &FlowId, port: &str) -> Result<&'a VLink, TranslationError> {
        self.tenant
            .port_vlink(port)
            .ok_or_else(|| TranslationError::MissingBinding(flow.clone(), port.to_owned()))
    }
    fn endpoint_vlink(
        &self,
        flow: &FlowId,
        endpoint: &EndpointId,
    ) -> Result<&'a VLink, TranslationError> {
        self.tenant
            .endpoint_vlink(endpoint)
            .ok_or_else(|| TranslationError::MissingBinding(flow.clone(), endpoint.to_string()))
    }
    /// Port of switch-0 on which traffic of an endpoint of another graph arrives
    fn arriving_from(&self, flow: &FlowId, endpoint: &EndpointId) -> Result<u32, TranslationError> {
        self.registry
            .action_port(endpoint)
            .ok_or_else(|| TranslationError::UnpublishedEndpoint(flow.clone(), endpoint.clone()))
    }
    /// Port of switch-0 towards an endpoint of another graph
    fn heading_to(&self, flow: &FlowId, endpoint: &EndpointId) -> Result<u32, TranslationError> {
        self.registry
            .match_port(endpoint)
            .ok_or_else(|| TranslationError::UnpublishedEndpoint(flow.clone(), endpoint.clone()))
    }

    /// Lower one rule of the graph
    ///
    /// # Errors
    ///
    /// Fails if the switches lack a port or link the rule needs, or if the rule has a shape
    /// graphs never admit.
    pub fn lower_rule(&self, rule: &Rule) -> Result<Lowered, TranslationError> {
        let flow = &rule.id;
        let zero = |in_port: u32, action: LowAction| {
            Some(FlowRule::new(
                lsi0_rule_id(self.graph.id(), flow),
                rule.priority,
                in_port,
                rule.r#match.fields.clone(),
                action,
            ))
        };
        let tenant = |in_port: u32, action: LowAction| {
            Some(FlowRule::new(
                flow.as_str(),
                rule.priority,
                in_port,
                rule.r#match.fields.clone(),
                action,
            ))
        };
        let elsewhere = |ep: &EndpointId| !self.graph.is_defined_here(ep);

        let lowered = match (&rule.r#match.on, &rule.action) {
            (Anchor::Port(p), Anchor::Port(q)) => Lowered {
                lsi0: zero(self.phy(flow, p)?, LowAction::Output(self.phy(flow, q)?)),
                tenant: None,
            },
            (Anchor::Port(p), Anchor::NetworkFunction(n)) => {
                let vlink = self.nf_vlink(flow, n)?;
                Lowered {
                    lsi0: zero(self.phy(flow, p)?, LowAction::Output(vlink.remote_port)),
                    tenant: tenant(vlink.local_port, LowAction::Output(self.nf_port(flow, n)?)),
                }
            }
            (Anchor::Port(p), Anchor::None) => Lowered {
                lsi0: zero(self.phy(flow, p)?, LowAction::Drop),
                tenant: None,
            },
            (Anchor::NetworkFunction(m), Anchor::Port(q)) => {
                let vlink = self.port_vlink(flow, q)?;
                Lowered {
                    lsi0: zero(vlink.remote_port, LowAction::Output(self.phy(flow, q)?)),
                    tenant: tenant(self.nf_port(flow, m)?, LowAction::Output(vlink.local_port)),
                }
            }
            (Anchor::NetworkFunction(m), Anchor::NetworkFunction(n)) => Lowered {
                lsi0: None,
                tenant: tenant(
                    self.nf_port(flow, m)?,
                    LowAction::Output(self.nf_port(flow, n)?),
                ),
            },
            (Anchor::NetworkFunction(m), Anchor::Endpoint(e)) => {
                let vlink = self.endpoint_vlink(flow, e)?;
                let lsi0 = if elsewhere(e) {
                    zero(vlink.remote_port, LowAction::Output(self.heading_to(flow, e)?))
                } else {
                    None
                };
                Lowered {
                    lsi0,
                    tenant: tenant(self.nf_port(flow, m)?, LowAction::Output(vlink.local_port)),
                }
            }
            (Anchor::NetworkFunction(m), Anchor::None) => Lowered {
                lsi0: None,
                tenant: tenant(self.nf_port(flow, m)?, LowAction::Drop),
            },
            (Anchor::Endpoint(e), Anchor::Port(q)) if elsewhere(e) => Lowered {
                lsi0: zero(self.arriving_from(flow, e)?, LowAction::Output(self.phy(flow, q)?)),
                tenant: None,
            },
            (Anchor::Endpoint(e), Anchor::NetworkFunction(n)) => {
                let vlink = self.nf_vlink(flow, n)?;
                let lsi0 = if elsewhere(e) {
                    zero(self.arriving_from(flow, e)?, LowAction::Output(vlink.remote_port))
                } else {
                    None
                };
                Lowered {
                    lsi0,
                    tenant: tenant(vlink.local_port, LowAction::Output(self.nf_port(flow, n)?)),
                }
            }
            (Anchor::Endpoint(e), Anchor::None) if elsewhere(e) => Lowered {
                lsi0: zero(self.arriving_from(flow, e)?, LowAction::Drop),
                tenant: None,
            },
            _ => return Err(TranslationError::Inadmissible(flow.clone())),
        };
        Ok(lowered)
    }

    /// Lower a set of rules of the graph
    ///
    /// # Errors
    ///
    /// Fails on the first rule that cannot be lowered.
    pub fn translate<'r>(
        &self,
        rules: impl IntoIterator<Item = &'r Rule>,
    ) -> Result<Translation, TranslationError> {
        let mut translation = Translation::default();
        for rule in rules {
            translation.push(self.lower_rule(rule)?);
        }
        debug!(
            "Graph {}: {} rule(s) for switch-0, {} for switch {}",
            self.graph.id(),
            translation.lsi0.len(),
            translation.tenant.len(),
            self.tenant.dpid()
        );
        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlgraph::HeaderFields;
    use lsi::{ControllerAddr, Dpid, LsiSpecBuilder, NfSpec, NfType, SwitchLayout, VLinkId};
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};

    fn ep(s: &str) -> EndpointId {
        s.parse().expect("Should succeed")
    }

    fn lsi0() -> Lsi {
        let spec = LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", 6653))
            .physical_ports(BTreeMap::from([
                ("eth0".to_owned(), "ethernet".to_owned()),
                ("eth1".to_owned(), "ethernet".to_owned()),
            ]))
            .build()
            .expect("Should succeed");
        let layout = SwitchLayout {
            dpid: Dpid(1),
            physical_ports: BTreeMap::from([("eth0".to_owned(), 1), ("eth1".to_owned(), 2)]),
            ..Default::default()
        };
        Lsi::from_layout(&spec, layout).expect("Should succeed")
    }

    // fw has ports 1 and 2 on switch ports 1 and 2, link 1 is 10 <-> 20, link 2 is 11 <-> 21
    fn tenant() -> Lsi {
        let spec = LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", 6654))
            .nfs(BTreeMap::from([(
                "fw".to_owned(),
                NfSpec {
                    nf_type: NfType::Docker,
                    ports: BTreeSet::from([1, 2]),
                },
            )]))
            .build()
            .expect("Should succeed");
        let layout = SwitchLayout {
            dpid: Dpid(2),
            nf_ports: BTreeMap::from([("fw".to_owned(), BTreeMap::from([(1, 1), (2, 2)]))]),
            vlinks: vec![
                VLink::new(VLinkId(1), 10, Dpid(1), 20),
                VLink::new(VLinkId(2), 11, Dpid(1), 21),
            ],
            ..Default::default()
        };
        let mut lsi = Lsi::from_layout(&spec, layout).expect("Should succeed");
        lsi.bind_nf(NfPort::new("fw", 1), VLinkId(1)).expect("Should succeed");
        lsi.bind_port("eth1", VLinkId(1)).expect("Should succeed");
        lsi.bind_endpoint(ep("g0:out"), VLinkId(2)).expect("Should succeed");
        lsi
    }

    #[test]
    fn test_lower_port_to_nf() {
        let graph = Graph::new("g1");
        let (lsi0, tenant, registry) = (lsi0(), tenant(), EndpointRegistry::new());
        let translator = Translator::new(&graph, &tenant, &lsi0, &registry);
        let fields = HeaderFields {
            tp_dst: Some(80),
            ..Default::default()
        };
        let rule = Rule::new("1", Anchor::port("eth0"), Anchor::nf("fw", 1))
            .with_priority(7)
            .with_fields(fields.clone());
        let lowered = translator.lower_rule(&rule).expect("Should succeed");
        assert_eq!(
            lowered.lsi0,
            Some(FlowRule::new("g1_1", 7, 1, fields.clone(), LowAction::Output(20)))
        );
        assert_eq!(
            lowered.tenant,
            Some(FlowRule::new("1", 7, 10, fields, LowAction::Output(1)))
        );
    }

    #[test]
    fn test_lower_nf_to_port_and_drop() {
        let graph = Graph::new("g1");
        let (lsi0, tenant, registry) = (lsi0(), tenant(), EndpointRegistry::new());
        let translator = Translator::new(&graph, &tenant, &lsi0, &registry);

        let rule = Rule::new("2", Anchor::nf("fw", 2), Anchor::port("eth1"));
        let lowered = translator.lower_rule(&rule).expect("Should succeed");
        assert_eq!(lowered.lsi0.map(|r| (r.in_port, r.action)), Some((20, LowAction::Output(2))));
        assert_eq!(lowered.tenant.map(|r| (r.in_port, r.action)), Some((2, LowAction::Output(10))));

        let rule = Rule::new("3", Anchor::nf("fw", 2), Anchor::None);
        let lowered = translator.lower_rule(&rule).expect("Should succeed");
        assert_eq!(lowered.lsi0, None);
        assert_eq!(lowered.tenant.map(|r| r.action), Some(LowAction::Drop));

        let rule = Rule::new("4", Anchor::port("eth0"), Anchor::port("eth1"));
        let lowered = translator.lower_rule(&rule).expect("Should succeed");
        assert_eq!(lowered.lsi0.map(|r| (r.in_port, r.action)), Some((1, LowAction::Output(2))));
        assert_eq!(lowered.tenant, None);
    }

    #[test]
    fn test_lower_endpoints() {
        let mut registry = EndpointRegistry::new();
        registry.publish_in_match(&ep("g0:out"), 30);
        registry.publish_in_action(&ep("g0:in"), 31);
        let graph = Graph::new("g1");
        let (lsi0, tenant) = (lsi0(), tenant());
        let translator = Translator::new(&graph, &tenant, &lsi0, &registry);

        // towards an endpoint of g0: through link 2, then to where g0 receives it
        let rule = Rule::new("5", Anchor::nf("fw", 2), Anchor::endpoint(ep("g0:out")));
        let lowered = translator.lower_rule(&rule).expect("Should succeed");
        assert_eq!(lowered.tenant.map(|r| (r.in_port, r.action)), Some((2, LowAction::Output(11))));
        assert_eq!(lowered.lsi0.map(|r| (r.in_port, r.action)), Some((21, LowAction::Output(30))));

        // from an endpoint of g0: where g0 delivers it, then through link 1
        let rule = Rule::new("6", Anchor::endpoint(ep("g0:in")), Anchor::nf("fw", 1));
        let lowered = translator.lower_rule(&rule).expect("Should succeed");
        assert_eq!(lowered.lsi0.map(|r| (r.in_port, r.action)), Some((31, LowAction::Output(20))));
        assert_eq!(lowered.tenant.map(|r| (r.in_port, r.action)), Some((10, LowAction::Output(1))));

        let rule = Rule::new("7", Anchor::endpoint(ep("g0:gone")), Anchor::port("eth0"));
        assert_eq!(
            translator.lower_rule(&rule),
            Err(TranslationError::UnpublishedEndpoint(FlowId::from("7"), ep("g0:gone")))
        );
    }

    #[test]
    fn test_lower_own_endpoints() {
        let registry = EndpointRegistry::new();
        let graph = Graph::new("g0");
        let (lsi0, tenant) = (lsi0(), tenant());
        let translator = Translator::new(&graph, &tenant, &lsi0, &registry);

        let rule = Rule::new("1", Anchor::nf("fw", 2), Anchor::endpoint(ep("g0:out")));
        let lowered = translator.lower_rule(&rule).expect("Should succeed");
        assert_eq!(lowered.lsi0, None);
        assert!(lowered.tenant.is_some());

        let rule = Rule::new("2", Anchor::endpoint(ep("g0:in")), Anchor::nf("fw", 1));
        let lowered = translator.lower_rule(&rule).expect("Should succeed");
        assert_eq!(lowered.lsi0, None);
        assert_eq!(lowered.tenant.map(|r| (r.in_port, r.action)), Some((10, LowAction::Output(1))));

        let rule = Rule::new("3", Anchor::endpoint(ep("g0:in")), Anchor::port("eth0"));
        assert_eq!(
            translator.lower_rule(&rule),
            Err(TranslationError::Inadmissible(FlowId::from("3")))
        );
    }

    #[test]
    fn test_translate_missing_binding() {
        let mut graph = Graph::new("g1");
        graph
            .add_rule(Rule::new("1", Anchor::port("eth0"), Anchor::nf("fw", 1)))
            .expect("Should succeed");
        graph
            .add_rule(Rule::new("2", Anchor::port("eth0"), Anchor::nf("fw", 2)))
            .expect("Should succeed");
        let (lsi0, tenant, registry) = (lsi0(), tenant(), EndpointRegistry::new());
        let translator = Translator::new(&graph, &tenant, &lsi0, &registry);
        assert_eq!(
            translator.translate(graph.rules()),
            Err(TranslationError::MissingBinding(
                FlowId::from("2"),
                "fw_2".to_owned()
            ))
        );
    }
}
