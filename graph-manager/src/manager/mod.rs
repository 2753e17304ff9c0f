// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The graph manager: it owns switch-0 and one tenant switch per deployed graph.
//!
//! Graphs are independent records, each behind its own async lock, so that operations on
//! different graphs proceed concurrently while the operations on one graph are serialized.
//! What graphs share (the endpoint registry and the numbering of controllers) sits behind a
//! short-lived synchronous lock which is never held across an await point.

mod create;
mod delete;
mod update;

use fabric::{
    ControllerFactory, FabricError, FlowController, NfRuntime, NfRuntimeFactory, SwitchFabric,
    WirelessControl,
};
use hlgraph::{EndpointId, FlowId, Graph, GraphId};
use lsi::{ControllerAddr, Dpid, FlowRule, Lsi, LsiSpec, VLinkId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::errors::{GraphManagerError, GraphManagerResult, Rejection};
use crate::params::GraphManagerParams;
use crate::registry::EndpointRegistry;
use crate::snapshot;
use crate::validity::{Delta, check_network_functions, check_resources};
use crate::vlinks::{Publication, destroy_vlinks};

/// The services the graph manager drives
#[derive(Clone)]
pub struct Collaborators {
    pub fabric: Arc<dyn SwitchFabric>,
    pub controllers: Arc<dyn ControllerFactory>,
    pub runtimes: Arc<dyn NfRuntimeFactory>,
    pub wireless: Arc<dyn WirelessControl>,
}

/// A deployed graph and what was built for it
pub(crate) struct TenantGraph {
    graph: Graph,
    lsi: Lsi,
    runtime: Arc<dyn NfRuntime>,
    controller: Box<dyn FlowController>,
}

type TenantSlot = Arc<AsyncMutex<Option<TenantGraph>>>;

struct Shared {
    /// `None` once every port after the first one is taken
    next_controller_port: Option<u16>,
    registry: EndpointRegistry,
}

/// What to take back when an operation fails half-way
#[derive(Default)]
struct Undo {
    switch: Option<Dpid>,
    vlinks: Vec<VLinkId>,
    nf_ports: Vec<String>,
    started_nfs: Vec<String>,
    lsi0_rules: Vec<FlowRule>,
}

pub struct GraphManager {
    params: GraphManagerParams,
    collab: Collaborators,
    lsi0: Lsi,
    lsi0_controller: Box<dyn FlowController>,
    shared: Mutex<Shared>,
    tenants: Mutex<BTreeMap<GraphId, TenantSlot>>,
}

impl GraphManager {
    /// Bring switch-0 up with every physical port of the node, plus the wireless interface if
    /// one is configured, and start its controller.
    ///
    /// # Errors
    ///
    /// Fails if the ports cannot be discovered, if switch-0 cannot be created, if the wireless
    /// interface cannot be attached or if the controller does not start. Whatever was built
    /// is torn down first.
    pub async fn new(params: GraphManagerParams, collab: Collaborators) -> GraphManagerResult<Self> {
        info!("Initializing graph manager:\n{params}");
        let discovered = collab.fabric.discover_physical_ports().await?;
        for (name, descriptor) in &discovered {
            debug!("Found physical port {name} of kind {}", descriptor.kind);
        }
        let controller = ControllerAddr::new(&params.controller_address, params.first_controller_port);
        let spec = LsiSpec {
            controller: controller.clone(),
            physical_ports: discovered
                .into_iter()
                .map(|(name, descriptor)| (name, descriptor.kind))
                .collect(),
            wireless: params.wireless.clone(),
            nfs: BTreeMap::new(),
            num_vlinks: 0,
            peer: None,
        };
        let layout = match collab.fabric.create_switch(&spec).await {
            Ok(layout) => layout,
            Err(e) => {
                destroy_partial_switch(collab.fabric.as_ref(), &e).await;
                return Err(e.into());
            }
        };
        let dpid = layout.dpid;
        let lsi0 = match Lsi::from_layout(&spec, layout) {
            Ok(lsi0) => lsi0,
            Err(e) => {
                destroy_switch_quietly(collab.fabric.as_ref(), dpid).await;
                return Err(e.into());
            }
        };
        if let Some(wireless) = lsi0.wireless()
            && !collab.wireless.attach(dpid, &wireless.name).await
        {
            error!("Failed to attach wireless interface {}", wireless.name);
            destroy_switch_quietly(collab.fabric.as_ref(), dpid).await;
            return Err(GraphManagerError::WirelessAttach(wireless.name.clone()));
        }
        let lsi0_controller = collab.controllers.controller(&controller);
        if let Err(e) = lsi0_controller.start().await {
            error!("Controller of switch-0 failed to start: {e}");
            detach_wireless(collab.wireless.as_ref(), &lsi0).await;
            destroy_switch_quietly(collab.fabric.as_ref(), dpid).await;
            return Err(e.into());
        }
        info!("Switch-0 is {dpid}, controlled by {controller}");

        Ok(Self {
            shared: Mutex::new(Shared {
                next_controller_port: params.first_controller_port.checked_add(1),
                registry: EndpointRegistry::new(),
            }),
            params,
            collab,
            lsi0,
            lsi0_controller,
            tenants: Mutex::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub fn params(&self) -> &GraphManagerParams {
        &self.params
    }
    #[must_use]
    pub fn lsi0(&self) -> &Lsi {
        &self.lsi0
    }

    fn slot(&self, id: &GraphId) -> Option<TenantSlot> {
        self.tenants.lock().get(id).cloned()
    }
    fn forget_slot(&self, id: &GraphId, slot: &TenantSlot) {
        let mut tenants = self.tenants.lock();
        if tenants.get(id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            tenants.remove(id);
        }
    }

    fn next_controller(&self) -> GraphManagerResult<ControllerAddr> {
        let mut shared = self.shared.lock();
        let port = shared
            .next_controller_port
            .ok_or(GraphManagerError::ControllerPortsExhausted)?;
        shared.next_controller_port = port.checked_add(1);
        Ok(ControllerAddr::new(&self.params.controller_address, port))
    }

    /// Check what a request introduces and take a reference on the endpoints of other graphs
    /// it uses. Returns the endpoints referenced.
    async fn admit(
        &self,
        graph: &Graph,
        delta: &Delta,
        runtime: &dyn NfRuntime,
    ) -> GraphManagerResult<Vec<EndpointId>> {
        let (mut violations, acquired) = {
            let mut shared = self.shared.lock();
            let violations = check_resources(graph, delta, &self.lsi0, &shared.registry);
            let mut acquired = vec![];
            if violations.is_empty() {
                for endpoint in delta.referenced_endpoints(graph) {
                    if shared.registry.acquire(endpoint) {
                        acquired.push(endpoint.clone());
                    }
                }
            }
            (violations, acquired)
        };
        match check_network_functions(delta, runtime).await {
            Ok(more) => violations.extend(more),
            Err(e) => {
                self.release_endpoints(&acquired);
                return Err(e.into());
            }
        }
        if violations.is_empty() {
            Ok(acquired)
        } else {
            self.release_endpoints(&acquired);
            for violation in &violations {
                warn!("Graph {}: {violation}", graph.id());
            }
            Err(Rejection::Invalid(violations).into())
        }
    }

    fn release_endpoints(&self, endpoints: &[EndpointId]) {
        if endpoints.is_empty() {
            return;
        }
        let mut shared = self.shared.lock();
        for endpoint in endpoints {
            shared.registry.release(endpoint);
        }
    }

    fn publish(&self, publications: &[Publication]) {
        let mut shared = self.shared.lock();
        for publication in publications {
            publication.apply(&mut shared.registry);
        }
    }

    /// Take back what an operation built on a tenant switch
    async fn rollback(&self, undo: Undo, dpid: Dpid, runtime: &dyn NfRuntime) {
        if !undo.lsi0_rules.is_empty()
            && let Err(e) = self.lsi0_controller.remove_rules(&undo.lsi0_rules).await
        {
            error!("Failed to remove rules from switch-0: {e}");
        }
        for nf in &undo.started_nfs {
            if !runtime.stop_nf(nf).await {
                warn!("Failed to stop network function {nf}");
            }
        }
        if let Some(switch) = undo.switch {
            destroy_switch_quietly(self.collab.fabric.as_ref(), switch).await;
            return;
        }
        for nf in &undo.nf_ports {
            if let Err(e) = self.collab.fabric.destroy_nf_ports(dpid, nf).await {
                error!("Failed to remove ports of {nf} from {dpid}: {e}");
            }
        }
        destroy_vlinks(self.collab.fabric.as_ref(), dpid, &undo.vlinks).await;
    }

    /// Tell if a graph is deployed
    pub async fn graph_exists(&self, id: &GraphId) -> bool {
        match self.slot(id) {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    pub async fn graph_contains_nf(&self, id: &GraphId, nf: &str) -> bool {
        match self.slot(id) {
            Some(slot) => slot
                .lock()
                .await
                .as_ref()
                .is_some_and(|tenant| tenant.graph.contains_nf(nf)),
            None => false,
        }
    }

    pub async fn flow_exists(&self, id: &GraphId, flow: &FlowId) -> bool {
        match self.slot(id) {
            Some(slot) => slot
                .lock()
                .await
                .as_ref()
                .is_some_and(|tenant| tenant.graph.contains_rule(flow)),
            None => false,
        }
    }

    /// Graphs deployed or being deployed
    #[must_use]
    pub fn graph_ids(&self) -> Vec<GraphId> {
        self.tenants.lock().keys().cloned().collect()
    }

    /// A copy of a deployed graph
    pub async fn graph(&self, id: &GraphId) -> Option<Graph> {
        let slot = self.slot(id)?;
        let guard = slot.lock().await;
        guard.as_ref().map(|tenant| tenant.graph.clone())
    }

    /// A copy of the switch built for a graph
    pub async fn tenant_switch(&self, id: &GraphId) -> Option<Lsi> {
        let slot = self.slot(id)?;
        let guard = slot.lock().await;
        guard.as_ref().map(|tenant| tenant.lsi.clone())
    }

    /// The JSON document of a deployed graph, under a `flow-graph` key
    ///
    /// # Errors
    ///
    /// Fails if the graph does not exist.
    pub async fn graph_json(&self, id: &GraphId) -> GraphManagerResult<serde_json::Value> {
        let graph = self
            .graph(id)
            .await
            .ok_or_else(|| GraphManagerError::NoSuchGraph(id.clone()))?;
        snapshot::graph_json(&graph)
    }

    /// The physical ports of the node as a JSON document
    #[must_use]
    pub fn physical_interfaces_json(&self) -> serde_json::Value {
        snapshot::interfaces_json(&self.lsi0)
    }

    /// The number of other graphs using an endpoint, if the endpoint is published
    #[must_use]
    pub fn endpoint_usage(&self, endpoint: &EndpointId) -> Option<u32> {
        self.shared.lock().registry.usage(endpoint)
    }

    /// Undeploy every graph and tear switch-0 down. Errors are logged, not returned.
    pub async fn shutdown(self) {
        info!("Shutting down graph manager");
        for id in self.graph_ids() {
            if let Err(e) = self.delete_graph(&id, true).await {
                error!("Failed to delete graph {id}: {e}");
            }
        }
        detach_wireless(self.collab.wireless.as_ref(), &self.lsi0).await;
        let dpid = self.lsi0.dpid();
        if let Err(e) = self.collab.fabric.destroy_switch(dpid).await {
            error!("Failed to destroy switch-0 {dpid}: {e}");
        }
        info!("Graph manager is down");
    }
}

async fn destroy_switch_quietly(fabric: &dyn SwitchFabric, dpid: Dpid) {
    if let Err(e) = fabric.destroy_switch(dpid).await {
        error!("Failed to destroy switch {dpid}: {e}");
    }
}

async fn destroy_partial_switch(fabric: &dyn SwitchFabric, error: &FabricError) {
    if let FabricError::SwitchCreation {
        partial: Some(dpid),
        ..
    } = error
    {
        warn!("Removing partially created switch {dpid}");
        destroy_switch_quietly(fabric, *dpid).await;
    }
}

async fn detach_wireless(wireless: &dyn WirelessControl, lsi: &Lsi) {
    if let Some(port) = lsi.wireless()
        && !wireless.detach(lsi.dpid(), &port.name).await
    {
        warn!("Failed to detach wireless interface {} from {}", port.name, lsi.dpid());
    }
}
