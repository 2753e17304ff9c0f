// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reclaiming of what a removed rule leaves unused on a tenant switch: the virtual link it
//! went through and the ports of network functions the graph no longer has.

use fabric::{NfRuntime, SwitchFabric};
use hlgraph::{Anchor, EndpointId, Graph, NfPort, RemovedRule};
use lsi::{Lsi, VLinkId};
use tracing::{debug, info, warn};

use crate::errors::GraphManagerResult;

/// What happened to a binding of the removed rule
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reclaim {
    /// Nothing was bound
    Unbound,
    /// Other rules still use the binding
    InUse,
    /// The binding went away but its link serves the other direction too
    Released,
    /// The binding and its link went away
    Destroyed(VLinkId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcReport {
    pub nf_port: Reclaim,
    pub port: Reclaim,
    pub endpoint: Reclaim,
    pub stopped_nfs: Vec<String>,
}

fn action_still_used(graph: &Graph, action: &Anchor) -> bool {
    graph.rules().any(|rule| &rule.action == action)
}

async fn reclaim_nf_port(
    fabric: &dyn SwitchFabric,
    graph: &Graph,
    lsi: &mut Lsi,
    nfport: &NfPort,
) -> GraphManagerResult<Reclaim> {
    if lsi.nf_vlink(nfport).is_none() {
        return Ok(Reclaim::Unbound);
    }
    if action_still_used(graph, &Anchor::NetworkFunction(nfport.clone())) {
        return Ok(Reclaim::InUse);
    }
    let Some(id) = lsi.unbind_nf(nfport) else {
        return Ok(Reclaim::Unbound);
    };
    if lsi.port_vlinks().values().any(|v| *v == id) {
        debug!("Switch {}: {id} still carries traffic to a port", lsi.dpid());
        return Ok(Reclaim::Released);
    }
    destroy(fabric, lsi, id).await
}

async fn reclaim_port(
    fabric: &dyn SwitchFabric,
    graph: &Graph,
    lsi: &mut Lsi,
    port: &str,
) -> GraphManagerResult<Reclaim> {
    if lsi.port_vlink(port).is_none() {
        return Ok(Reclaim::Unbound);
    }
    if action_still_used(graph, &Anchor::port(port)) {
        return Ok(Reclaim::InUse);
    }
    let Some(id) = lsi.unbind_port(port) else {
        return Ok(Reclaim::Unbound);
    };
    if lsi.nf_vlinks().values().any(|v| *v == id) {
        debug!("Switch {}: {id} still carries traffic to a function", lsi.dpid());
        return Ok(Reclaim::Released);
    }
    destroy(fabric, lsi, id).await
}

async fn reclaim_endpoint(
    fabric: &dyn SwitchFabric,
    graph: &Graph,
    lsi: &mut Lsi,
    endpoint: &EndpointId,
) -> GraphManagerResult<Reclaim> {
    if lsi.endpoint_vlink(endpoint).is_none() {
        return Ok(Reclaim::Unbound);
    }
    if action_still_used(graph, &Anchor::endpoint(endpoint.clone())) {
        return Ok(Reclaim::InUse);
    }
    let Some(id) = lsi.unbind_endpoint(endpoint) else {
        return Ok(Reclaim::Unbound);
    };
    destroy(fabric, lsi, id).await
}

async fn destroy(
    fabric: &dyn SwitchFabric,
    lsi: &mut Lsi,
    id: VLinkId,
) -> GraphManagerResult<Reclaim> {
    fabric.destroy_virtual_link(lsi.dpid(), id).await?;
    lsi.remove_vlink(id);
    debug!("Switch {}: destroyed {id}", lsi.dpid());
    Ok(Reclaim::Destroyed(id))
}

/// Reclaim what `removed` left unused. `graph` is the graph once the rule is gone.
///
/// # Errors
///
/// Fails if the fabric fails to destroy a link or the ports of a network function.
pub async fn collect(
    fabric: &dyn SwitchFabric,
    runtime: &dyn NfRuntime,
    graph: &Graph,
    lsi: &mut Lsi,
    removed: &RemovedRule,
) -> GraphManagerResult<GcReport> {
    let nf_port = match removed.action_nf_port() {
        Some(nfport) => reclaim_nf_port(fabric, graph, lsi, nfport).await?,
        None => Reclaim::Unbound,
    };
    let port = match removed.action_port() {
        Some(p) => reclaim_port(fabric, graph, lsi, p).await?,
        None => Reclaim::Unbound,
    };
    let endpoint = match removed.action_endpoint() {
        Some(ep) => reclaim_endpoint(fabric, graph, lsi, ep).await?,
        None => Reclaim::Unbound,
    };

    let mut stopped_nfs = vec![];
    for nf in &removed.gone_nfs {
        info!("Graph {}: network function {nf} is no longer used", graph.id());
        if !runtime.stop_nf(nf).await {
            warn!("Failed to stop network function {nf}");
        }
        fabric.destroy_nf_ports(lsi.dpid(), nf).await?;
        lsi.remove_nf(nf);
        stopped_nfs.push(nf.clone());
    }
    for port in &removed.gone_ports {
        debug!("Graph {}: physical port {port} is no longer used", graph.id());
    }
    Ok(GcReport {
        nf_port,
        port,
        endpoint,
        stopped_nfs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric::NfRuntimeFactory;
    use fabric::sim::{SimFabric, SimNfRuntimes};
    use hlgraph::{FlowId, Rule};
    use lsi::{ControllerAddr, LsiSpec, LsiSpecBuilder, NfSpec, NfType};
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};
    use tracing_test::traced_test;

    use crate::vlinks::VlinkPlan;

    fn ep(s: &str) -> EndpointId {
        s.parse().expect("Should succeed")
    }

    struct Setup {
        fabric: SimFabric,
        runtimes: SimNfRuntimes,
        graph: Graph,
        lsi: Lsi,
    }

    async fn setup(rules: Vec<Rule>) -> Setup {
        let fabric = SimFabric::new(&[("eth0", "ethernet"), ("eth1", "ethernet")]);
        let runtimes = SimNfRuntimes::new(&[("fw", NfType::Docker), ("nat", NfType::Docker)]);
        let lsi0 = fabric
            .create_switch(
                &LsiSpecBuilder::default()
                    .controller(ControllerAddr::new("127.0.0.1", 6653))
                    .build()
                    .expect("Should succeed"),
            )
            .await
            .expect("Should succeed");

        let mut graph = Graph::new("g1");
        for rule in rules {
            graph.add_rule(rule).expect("Should succeed");
        }
        let plan = VlinkPlan::identify(&graph, None);
        let spec: LsiSpec = LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", 6654))
            .nfs(
                graph
                    .network_functions()
                    .values()
                    .map(|nf| {
                        (
                            nf.name.clone(),
                            NfSpec {
                                nf_type: NfType::Docker,
                                ports: nf.ports.keys().copied().collect::<BTreeSet<_>>(),
                            },
                        )
                    })
                    .collect::<BTreeMap<_, _>>(),
            )
            .num_vlinks(plan.required())
            .peer(Some(lsi0.dpid))
            .build()
            .expect("Should succeed");
        let layout = fabric.create_switch(&spec).await.expect("Should succeed");
        let links: Vec<VLinkId> = layout.vlinks.iter().map(|v| v.id).collect();
        let mut lsi = Lsi::from_layout(&spec, layout).expect("Should succeed");
        plan.bind(&mut lsi, &links).expect("Should succeed");
        Setup {
            fabric,
            runtimes,
            graph,
            lsi,
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn test_shared_link_survives_one_direction() {
        let Setup {
            fabric,
            runtimes,
            mut graph,
            mut lsi,
        } = setup(vec![
            Rule::new("1", Anchor::port("eth0"), Anchor::nf("fw", 1)),
            Rule::new("2", Anchor::nf("fw", 2), Anchor::port("eth1")),
            Rule::new("3", Anchor::port("eth1"), Anchor::nf("fw", 1)),
        ])
        .await;
        let runtime = runtimes.runtime();
        assert_eq!(lsi.num_vlinks(), 1);

        let removed = graph.remove_rule(&FlowId::from("2")).expect("Should succeed");
        let report = collect(&fabric, runtime.as_ref(), &graph, &mut lsi, &removed)
            .await
            .expect("Should succeed");
        assert_eq!(report.port, Reclaim::Released);
        assert_eq!(lsi.num_vlinks(), 1);

        let removed = graph.remove_rule(&FlowId::from("1")).expect("Should succeed");
        let report = collect(&fabric, runtime.as_ref(), &graph, &mut lsi, &removed)
            .await
            .expect("Should succeed");
        assert_eq!(report.nf_port, Reclaim::InUse);

        let removed = graph.remove_rule(&FlowId::from("3")).expect("Should succeed");
        let report = collect(&fabric, runtime.as_ref(), &graph, &mut lsi, &removed)
            .await
            .expect("Should succeed");
        assert!(matches!(report.nf_port, Reclaim::Destroyed(_)));
        assert_eq!(report.stopped_nfs, vec!["fw".to_owned()]);
        assert_eq!(lsi.num_vlinks(), 0);
        assert!(!lsi.contains_nf("fw"));
        assert_eq!(fabric.num_vlinks(lsi.dpid()), 0);
        assert!(fabric.nfs_on(lsi.dpid()).is_empty());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_endpoint_link_destroyed() {
        let Setup {
            fabric,
            runtimes,
            mut graph,
            mut lsi,
        } = setup(vec![
            Rule::new("1", Anchor::nf("fw", 1), Anchor::endpoint(ep("g1:out"))),
            Rule::new("2", Anchor::nf("fw", 1), Anchor::nf("nat", 1)),
        ])
        .await;
        let runtime = runtimes.runtime();
        assert_eq!(lsi.num_vlinks(), 1);

        let removed = graph.remove_rule(&FlowId::from("1")).expect("Should succeed");
        assert_eq!(removed.gone_endpoints, vec![ep("g1:out")]);
        let report = collect(&fabric, runtime.as_ref(), &graph, &mut lsi, &removed)
            .await
            .expect("Should succeed");
        assert!(matches!(report.endpoint, Reclaim::Destroyed(_)));
        assert!(report.stopped_nfs.is_empty());
        assert!(lsi.endpoint_vlinks().is_empty());
        assert_eq!(fabric.num_vlinks(lsi.dpid()), 0);
    }
}
