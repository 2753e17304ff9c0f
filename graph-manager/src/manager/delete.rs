// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use hlgraph::{EndpointId, FlowId, Graph, GraphId};
use tracing::{debug, info};

use super::{GraphManager, TenantGraph, TenantSlot, detach_wireless};
use crate::errors::{GraphManagerError, GraphManagerResult, Rejection};
use crate::gc;
use crate::translator::{Translator, lsi0_rule_id};

impl GraphManager {
    /// Retire endpoints of a graph being torn down, unless another graph uses one of them.
    /// Checking and retiring happen under the same lock so that no graph can start using
    /// them in between.
    fn retire_endpoints(&self, endpoints: &[&EndpointId]) -> Result<(), Rejection> {
        let mut shared = self.shared.lock();
        for endpoint in endpoints {
            if let Some(users) = shared.registry.usage(endpoint)
                && users > 0
            {
                return Err(Rejection::EndpointInUse {
                    endpoint: (*endpoint).clone(),
                    users,
                });
            }
        }
        for endpoint in endpoints {
            shared.registry.retire(endpoint);
        }
        Ok(())
    }

    fn reinstate_endpoints(&self, endpoints: &[&EndpointId]) {
        let mut shared = self.shared.lock();
        for endpoint in endpoints {
            shared.registry.reinstate(endpoint);
        }
    }

    /// Undeploy a graph: remove its rules, stop its network functions and destroy its switch.
    /// Unless shutting down, a graph defining an endpoint other graphs use cannot be deleted.
    ///
    /// # Errors
    ///
    /// Fails if the graph does not exist or if its endpoints are in use. Fails on any
    /// infrastructure error, in which case the graph may be partially torn down.
    pub async fn delete_graph(&self, id: &GraphId, shutdown: bool) -> GraphManagerResult<()> {
        let slot = self
            .slot(id)
            .ok_or_else(|| GraphManagerError::NoSuchGraph(id.clone()))?;
        let mut entry = slot.lock().await;
        self.delete_locked(id, &slot, &mut entry, shutdown).await
    }

    async fn delete_locked(
        &self,
        id: &GraphId,
        slot: &TenantSlot,
        entry: &mut Option<TenantGraph>,
        shutdown: bool,
    ) -> GraphManagerResult<()> {
        let Some(tenant) = entry.as_ref() else {
            return Err(GraphManagerError::NoSuchGraph(id.clone()));
        };
        info!("Deleting graph {id}");
        let defined: Vec<&EndpointId> = tenant.graph.defined_endpoints().collect();
        if !shutdown {
            self.retire_endpoints(&defined)?;
        }
        if let Err(e) = self.teardown(tenant).await {
            if !shutdown {
                self.reinstate_endpoints(&defined);
            }
            return Err(e);
        }

        {
            let mut shared = self.shared.lock();
            if !shutdown {
                for endpoint in &defined {
                    shared.registry.purge(endpoint);
                }
            }
            for endpoint in tenant.graph.referenced_endpoints() {
                shared.registry.release(endpoint);
            }
        }
        *entry = None;
        self.forget_slot(id, slot);
        info!("Graph {id} is deleted");
        Ok(())
    }

    async fn teardown(&self, tenant: &TenantGraph) -> GraphManagerResult<()> {
        let translation = {
            let shared = self.shared.lock();
            Translator::new(&tenant.graph, &tenant.lsi, &self.lsi0, &shared.registry)
                .translate(tenant.graph.rules())?
        };
        self.lsi0_controller.remove_rules(&translation.lsi0).await?;
        tenant.runtime.stop_all().await;
        self.collab.fabric.destroy_switch(tenant.lsi.dpid()).await?;
        detach_wireless(self.collab.wireless.as_ref(), &tenant.lsi).await;
        Ok(())
    }

    /// Remove one flow from a graph, and whatever it alone needed. Removing the last flow
    /// deletes the graph.
    ///
    /// # Errors
    ///
    /// Fails if the graph or the flow does not exist. Rejects the removal of a flow involving
    /// an endpoint of this graph that other graphs use. Fails on any infrastructure error.
    pub async fn delete_flow(&self, id: &GraphId, flow: &FlowId) -> GraphManagerResult<()> {
        let Some(slot) = self.slot(id) else {
            debug_assert!(false, "deleting flow {flow} of unknown graph {id}");
            return Err(GraphManagerError::NoSuchGraph(id.clone()));
        };
        let mut entry = slot.lock().await;
        let remaining = match entry.as_ref() {
            Some(tenant) if tenant.graph.contains_rule(flow) => tenant.graph.num_rules(),
            Some(_) => return Err(GraphManagerError::NoSuchFlow(id.clone(), flow.clone())),
            None => return Err(GraphManagerError::NoSuchGraph(id.clone())),
        };
        if remaining == 1 {
            info!("Flow {flow} is the last of graph {id}");
            return self.delete_locked(id, &slot, &mut entry, false).await;
        }
        let Some(tenant) = entry.as_mut() else {
            return Err(GraphManagerError::NoSuchGraph(id.clone()));
        };
        info!("Deleting flow {flow} of graph {id}");

        let involved = tenant.graph.endpoint_involved(flow).cloned();
        let retired = match &involved {
            Some(endpoint) if tenant.graph.is_defined_here(endpoint) => {
                self.retire_endpoints(&[endpoint])?;
                Some(endpoint)
            }
            _ => None,
        };
        if let Err(e) = self.remove_flow(id, flow, tenant).await {
            if let Some(endpoint) = retired {
                self.reinstate_endpoints(&[endpoint]);
            }
            return Err(e);
        }
        if let Some(endpoint) = &involved {
            self.forget_endpoint(&tenant.graph, endpoint);
        }
        Ok(())
    }

    /// Remove the rules derived from a flow, then the flow, and reclaim what it alone used
    async fn remove_flow(
        &self,
        id: &GraphId,
        flow: &FlowId,
        tenant: &mut TenantGraph,
    ) -> GraphManagerResult<()> {
        let Some(rule) = tenant.graph.rule(flow).cloned() else {
            return Err(GraphManagerError::NoSuchFlow(id.clone(), flow.clone()));
        };
        let lowered = {
            let shared = self.shared.lock();
            Translator::new(&tenant.graph, &tenant.lsi, &self.lsi0, &shared.registry)
                .lower_rule(&rule)?
        };
        if lowered.lsi0.is_some() {
            self.lsi0_controller
                .remove_rule_by_id(&lsi0_rule_id(id, flow))
                .await?;
        }
        if lowered.tenant.is_some() {
            tenant.controller.remove_rule_by_id(flow.as_str()).await?;
        }

        let Some(removed) = tenant.graph.remove_rule(flow) else {
            return Err(GraphManagerError::NoSuchFlow(id.clone(), flow.clone()));
        };
        let report = gc::collect(
            self.collab.fabric.as_ref(),
            tenant.runtime.as_ref(),
            &tenant.graph,
            &mut tenant.lsi,
            &removed,
        )
        .await?;
        debug!("Flow {flow} of graph {id} reclaimed: {report:?}");
        Ok(())
    }

    /// Update the registry for an endpoint a removed flow involved. An endpoint of this graph
    /// still in use by its remaining rules is reinstated.
    fn forget_endpoint(&self, graph: &Graph, endpoint: &EndpointId) {
        let mut shared = self.shared.lock();
        if !graph.is_defined_here(endpoint) {
            if !graph.contains_endpoint(endpoint) {
                shared.registry.release(endpoint);
            }
            return;
        }
        let in_match = graph.endpoint_used_in_match(endpoint);
        let in_action = graph.endpoint_used_in_action(endpoint);
        if !in_match && !in_action {
            shared.registry.purge(endpoint);
        } else if !in_match {
            shared.registry.withdraw_in_match(endpoint);
        } else if !in_action {
            shared.registry.withdraw_in_action(endpoint);
        }
        shared.registry.reinstate(endpoint);
    }
}
