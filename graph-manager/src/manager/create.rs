// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use fabric::{FlowController, NfRuntime};
use hlgraph::Graph;
use lsi::{ControllerAddr, Lsi, LsiSpec, NfSpec, VLinkId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info};

use super::{GraphManager, TenantGraph, Undo, destroy_partial_switch};
use crate::errors::{GraphManagerError, GraphManagerResult, Rejection};
use crate::nfstart::{NfStart, start_all};
use crate::translator::Translator;
use crate::validity::Delta;
use crate::vlinks::{VlinkPlan, publications};

impl GraphManager {
    /// Deploy a new graph: check it, build its switch and links, start its network functions
    /// and install its rules. On failure nothing of it remains.
    ///
    /// # Errors
    ///
    /// Rejects graphs whose id is taken or that refer to what this node does not have. Fails
    /// on any infrastructure error.
    pub async fn create_graph(&self, graph: Graph) -> GraphManagerResult<()> {
        let id = graph.id().clone();
        info!("Creating graph {id} with {} rule(s)", graph.num_rules());

        let slot = Arc::new(AsyncMutex::new(None));
        let mut entry = slot.clone().lock_owned().await;
        {
            let mut tenants = self.tenants.lock();
            if tenants.contains_key(&id) {
                return Err(Rejection::GraphExists(id).into());
            }
            tenants.insert(id.clone(), slot.clone());
        }

        match self.instantiate(graph).await {
            Ok(tenant) => {
                *entry = Some(tenant);
                info!("Graph {id} is deployed");
                Ok(())
            }
            Err(e) => {
                error!("Failed to create graph {id}: {e}");
                self.forget_slot(&id, &slot);
                Err(e)
            }
        }
    }

    async fn instantiate(&self, graph: Graph) -> GraphManagerResult<TenantGraph> {
        let runtime = self.collab.runtimes.runtime();
        let acquired = self
            .admit(&graph, &Delta::full(&graph), runtime.as_ref())
            .await?;
        let addr = match self.next_controller() {
            Ok(addr) => addr,
            Err(e) => {
                self.release_endpoints(&acquired);
                return Err(e);
            }
        };
        let controller = self.collab.controllers.controller(&addr);
        if let Err(e) = controller.start().await {
            self.release_endpoints(&acquired);
            return Err(e.into());
        }
        if !runtime.select_implementation().await {
            self.release_endpoints(&acquired);
            return Err(GraphManagerError::NfSelection);
        }
        self.build_tenant(graph, addr, runtime, controller)
            .await
            .inspect_err(|_| self.release_endpoints(&acquired))
    }

    async fn build_tenant(
        &self,
        graph: Graph,
        addr: ControllerAddr,
        runtime: Arc<dyn NfRuntime>,
        controller: Box<dyn FlowController>,
    ) -> GraphManagerResult<TenantGraph> {
        let plan = VlinkPlan::identify(&graph, None);
        let spec = LsiSpec {
            controller: addr,
            physical_ports: BTreeMap::new(),
            wireless: None,
            nfs: graph
                .network_functions()
                .values()
                .map(|nf| {
                    let spec = NfSpec {
                        nf_type: runtime.nf_type(&nf.name).unwrap_or_default(),
                        ports: nf.ports.keys().copied().collect(),
                    };
                    (nf.name.clone(), spec)
                })
                .collect(),
            num_vlinks: plan.required(),
            peer: Some(self.lsi0.dpid()),
        };
        let layout = match self.collab.fabric.create_switch(&spec).await {
            Ok(layout) => layout,
            Err(e) => {
                destroy_partial_switch(self.collab.fabric.as_ref(), &e).await;
                return Err(e.into());
            }
        };
        let dpid = layout.dpid;
        debug!(
            "Graph {}: switch {dpid} with {} virtual link(s)",
            graph.id(),
            layout.vlinks.len()
        );

        let mut undo = Undo {
            switch: Some(dpid),
            ..Default::default()
        };
        let links: Vec<VLinkId> = layout.vlinks.iter().map(|v| v.id).collect();
        let populated = match Lsi::from_layout(&spec, layout) {
            Ok(lsi) => {
                self.populate(&graph, lsi, &plan, &links, &runtime, controller.as_ref(), &mut undo)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        match populated {
            Ok(lsi) => Ok(TenantGraph {
                graph,
                lsi,
                runtime,
                controller,
            }),
            Err(e) => {
                self.rollback(undo, dpid, runtime.as_ref()).await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn populate(
        &self,
        graph: &Graph,
        mut lsi: Lsi,
        plan: &VlinkPlan,
        links: &[VLinkId],
        runtime: &Arc<dyn NfRuntime>,
        controller: &dyn FlowController,
        undo: &mut Undo,
    ) -> GraphManagerResult<Lsi> {
        plan.bind(&mut lsi, links)?;

        runtime.set_switch(lsi.dpid());
        let nfs = NfStart::from_graph(graph, graph.network_functions().keys());
        start_all(runtime.clone(), nfs, self.params.max_parallel_nf_starts).await?;
        undo.started_nfs = graph.network_functions().keys().cloned().collect();

        let translation = {
            let shared = self.shared.lock();
            Translator::new(graph, &lsi, &self.lsi0, &shared.registry).translate(graph.rules())?
        };
        let published = publications(graph, graph.rules(), &lsi)?;

        controller.install_rules(&translation.tenant).await?;
        undo.lsi0_rules.clone_from(&translation.lsi0);
        self.lsi0_controller.install_rules(&translation.lsi0).await?;

        self.publish(&published);
        Ok(lsi)
    }
}
