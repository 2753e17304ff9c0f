// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use hlgraph::{Graph, GraphError, GraphId};
use lsi::Lsi;
use std::collections::BTreeSet;
use tracing::{debug, error, info};

use super::{GraphManager, TenantGraph, Undo};
use crate::errors::{GraphManagerError, GraphManagerResult, Rejection};
use crate::nfstart::{NfStart, start_all};
use crate::translator::Translator;
use crate::validity::Delta;
use crate::vlinks::{VlinkPlan, publications};

impl GraphManager {
    /// Add the rules of `piece`, and what they refer to, to a deployed graph. Network functions
    /// already deployed cannot gain ports. On failure the graph is left as it was.
    ///
    /// # Errors
    ///
    /// Fails if the graph does not exist. Rejects pieces that reuse flow ids, that add ports to
    /// deployed network functions or that refer to what this node does not have. Fails on any
    /// infrastructure error.
    pub async fn update_graph(&self, id: &GraphId, piece: Graph) -> GraphManagerResult<()> {
        if piece.id() != id {
            return Err(GraphError::GraphIdMismatch(piece.id().clone(), id.clone()).into());
        }
        let slot = self
            .slot(id)
            .ok_or_else(|| GraphManagerError::NoSuchGraph(id.clone()))?;
        let mut entry = slot.lock().await;
        let Some(tenant) = entry.as_mut() else {
            return Err(GraphManagerError::NoSuchGraph(id.clone()));
        };
        info!("Updating graph {id} with {} rule(s)", piece.num_rules());

        if let Some(rule) = piece.rules().find(|r| tenant.graph.contains_rule(&r.id)) {
            return Err(Rejection::Graph(GraphError::DuplicateFlow(rule.id.clone())).into());
        }
        let delta = Delta::between(&tenant.graph, &piece)?;
        let mut merged = tenant.graph.clone();
        merged.merge(&piece)?;
        debug!(
            "Graph {id}: {} new port(s), {} new endpoint(s), {} new network function(s)",
            delta.ports.len(),
            delta.endpoints.len(),
            delta.nfs.len()
        );

        let acquired = self.admit(&piece, &delta, tenant.runtime.as_ref()).await?;
        let mut undo = Undo::default();
        match self.extend(tenant, &merged, &piece, &delta, &mut undo).await {
            Ok(lsi) => {
                tenant.graph = merged;
                tenant.lsi = lsi;
                info!("Graph {id} is updated");
                Ok(())
            }
            Err(e) => {
                error!("Failed to update graph {id}: {e}");
                self.rollback(undo, tenant.lsi.dpid(), tenant.runtime.as_ref())
                    .await;
                self.release_endpoints(&acquired);
                Err(e)
            }
        }
    }

    /// Build what `piece` needs on a copy of the switch of `tenant`
    async fn extend(
        &self,
        tenant: &TenantGraph,
        merged: &Graph,
        piece: &Graph,
        delta: &Delta,
        undo: &mut Undo,
    ) -> GraphManagerResult<Lsi> {
        let runtime = &tenant.runtime;
        if !delta.nfs.is_empty() && !runtime.select_implementation().await {
            return Err(GraphManagerError::NfSelection);
        }

        let mut lsi = tenant.lsi.clone();
        let plan = VlinkPlan::identify(piece, Some(&lsi));
        undo.vlinks = plan
            .allocate(self.collab.fabric.as_ref(), &mut lsi, self.lsi0.dpid())
            .await?;

        for name in &delta.nfs {
            let Some(nf) = merged.network_function(name) else {
                continue;
            };
            let nf_type = runtime.nf_type(name).unwrap_or_default();
            let ports: BTreeSet<u32> = nf.ports.keys().copied().collect();
            let mapping = self
                .collab
                .fabric
                .add_nf_ports(lsi.dpid(), name, nf_type, &ports)
                .await?;
            undo.nf_ports.push(name.clone());
            lsi.add_nf(name, nf_type, mapping)?;
        }

        let nfs = NfStart::from_graph(merged, &delta.nfs);
        start_all(runtime.clone(), nfs, self.params.max_parallel_nf_starts).await?;
        undo.started_nfs.extend(delta.nfs.iter().cloned());

        let translation = {
            let shared = self.shared.lock();
            Translator::new(merged, &lsi, &self.lsi0, &shared.registry).translate(piece.rules())?
        };
        let published = publications(merged, piece.rules(), &lsi)?;

        undo.lsi0_rules.clone_from(&translation.lsi0);
        self.lsi0_controller.install_rules(&translation.lsi0).await?;
        if let Err(e) = tenant.controller.install_rules(&translation.tenant).await {
            if let Err(e) = tenant.controller.remove_rules(&translation.tenant).await {
                error!("Failed to remove rules from {}: {e}", lsi.dpid());
            }
            return Err(e.into());
        }

        self.publish(&published);
        Ok(lsi)
    }
}
