// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory switch fabric

use async_trait::async_trait;
use lsi::{Dpid, LsiSpec, NfType, SwitchLayout, VLink, VLinkId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::errors::FabricError;
use crate::switch::{PortDescriptor, SwitchFabric};

#[derive(Debug, Default)]
struct SimSwitch {
    next_port: u32,
    /// links owned by this switch
    vlinks: BTreeMap<VLinkId, VLink>,
    /// ports of this switch that are the far end of links owned by other switches
    peer_ports: BTreeSet<u32>,
    nfs: BTreeMap<String, BTreeMap<u32, u32>>,
}

impl SimSwitch {
    fn new_port(&mut self) -> u32 {
        self.next_port += 1;
        self.next_port
    }
}

#[derive(Debug, Default)]
struct Faults {
    create_switch: Option<bool>,
    vlinks_before_failure: Option<usize>,
    destroy_switch: bool,
    add_nf_ports: bool,
}

#[derive(Debug, Default)]
struct FabricState {
    physical: BTreeMap<String, PortDescriptor>,
    next_dpid: u64,
    next_vlink: u64,
    switches: BTreeMap<Dpid, SimSwitch>,
    faults: Faults,
}

impl FabricState {
    fn switch_mut(&mut self, dpid: Dpid) -> Result<&mut SimSwitch, FabricError> {
        self.switches
            .get_mut(&dpid)
            .ok_or(FabricError::UnknownSwitch(dpid))
    }

    fn new_vlink(&mut self, dpid: Dpid, peer: Dpid) -> Result<VLink, FabricError> {
        if !self.switches.contains_key(&peer) {
            return Err(FabricError::VLinkCreation(dpid, format!("no peer switch {peer}")));
        }
        if let Some(remaining) = self.faults.vlinks_before_failure.as_mut() {
            if *remaining == 0 {
                self.faults.vlinks_before_failure = None;
                return Err(FabricError::VLinkCreation(dpid, "injected failure".to_owned()));
            }
            *remaining -= 1;
        }
        self.next_vlink += 1;
        let id = VLinkId(self.next_vlink);
        let remote_port = self.switch_mut(peer)?.new_port();
        self.switch_mut(peer)?.peer_ports.insert(remote_port);
        let switch = self.switch_mut(dpid)?;
        let vlink = VLink::new(id, switch.new_port(), peer, remote_port);
        switch.vlinks.insert(id, vlink.clone());
        Ok(vlink)
    }

    fn drop_vlink(&mut self, dpid: Dpid, id: VLinkId) -> Result<(), FabricError> {
        let vlink = self
            .switch_mut(dpid)?
            .vlinks
            .remove(&id)
            .ok_or_else(|| FabricError::VLinkDestruction(dpid, id, "no such link".to_owned()))?;
        if let Some(peer) = self.switches.get_mut(&vlink.remote_dpid) {
            peer.peer_ports.remove(&vlink.remote_port);
        }
        Ok(())
    }
}

/// A fabric that keeps switches in memory. Failures can be injected for the next call of an
/// operation.
#[derive(Debug, Default)]
pub struct SimFabric {
    state: Mutex<FabricState>,
}

impl SimFabric {
    /// Create a fabric on a node with the given physical ports, as `(name, kind)`
    #[must_use]
    pub fn new(ports: &[(&str, &str)]) -> Self {
        let physical = ports
            .iter()
            .map(|(name, kind)| ((*name).to_owned(), PortDescriptor::new(*kind)))
            .collect();
        Self {
            state: Mutex::new(FabricState {
                physical,
                ..Default::default()
            }),
        }
    }

    /// Make the next switch creation fail, leaving a partial switch behind if `partial`
    pub fn fail_next_switch_creation(&self, partial: bool) {
        self.state.lock().faults.create_switch = Some(partial);
    }
    /// Let `successes` virtual links be created, then fail the next creation
    pub fn fail_vlink_creation_after(&self, successes: usize) {
        self.state.lock().faults.vlinks_before_failure = Some(successes);
    }
    pub fn fail_next_switch_destruction(&self) {
        self.state.lock().faults.destroy_switch = true;
    }
    pub fn fail_next_nf_ports(&self) {
        self.state.lock().faults.add_nf_ports = true;
    }

    #[must_use]
    pub fn switch_exists(&self, dpid: Dpid) -> bool {
        self.state.lock().switches.contains_key(&dpid)
    }
    #[must_use]
    pub fn num_switches(&self) -> usize {
        self.state.lock().switches.len()
    }
    /// Number of links owned by a switch
    #[must_use]
    pub fn num_vlinks(&self, dpid: Dpid) -> usize {
        self.state
            .lock()
            .switches
            .get(&dpid)
            .map_or(0, |s| s.vlinks.len())
    }
    /// Number of ports of a switch that are the far end of a link
    #[must_use]
    pub fn num_peer_ports(&self, dpid: Dpid) -> usize {
        self.state
            .lock()
            .switches
            .get(&dpid)
            .map_or(0, |s| s.peer_ports.len())
    }
    #[must_use]
    pub fn nfs_on(&self, dpid: Dpid) -> BTreeSet<String> {
        self.state
            .lock()
            .switches
            .get(&dpid)
            .map(|s| s.nfs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SwitchFabric for SimFabric {
    async fn discover_physical_ports(
        &self,
    ) -> Result<BTreeMap<String, PortDescriptor>, FabricError> {
        Ok(self.state.lock().physical.clone())
    }

    async fn create_switch(&self, spec: &LsiSpec) -> Result<SwitchLayout, FabricError> {
        let mut state = self.state.lock();
        state.next_dpid += 1;
        let dpid = Dpid(state.next_dpid);

        if let Some(partial) = state.faults.create_switch.take() {
            if partial {
                state.switches.insert(dpid, SimSwitch::default());
            }
            return Err(FabricError::SwitchCreation {
                partial: partial.then_some(dpid),
                reason: "injected failure".to_owned(),
            });
        }
        if let Some(port) = spec
            .physical_ports
            .keys()
            .find(|p| !state.physical.contains_key(*p))
        {
            return Err(FabricError::SwitchCreation {
                partial: None,
                reason: format!("no physical port {port}"),
            });
        }

        let mut switch = SimSwitch::default();
        let mut layout = SwitchLayout {
            dpid,
            ..Default::default()
        };
        for name in spec.physical_ports.keys() {
            layout.physical_ports.insert(name.clone(), switch.new_port());
        }
        if spec.wireless.is_some() {
            layout.wireless_port = Some(switch.new_port());
        }
        for (name, nfspec) in &spec.nfs {
            let ports: BTreeMap<u32, u32> = nfspec
                .ports
                .iter()
                .map(|p| (*p, switch.new_port()))
                .collect();
            switch.nfs.insert(name.clone(), ports.clone());
            layout.nf_ports.insert(name.clone(), ports);
        }
        state.switches.insert(dpid, switch);

        if spec.num_vlinks > 0 {
            let Some(peer) = spec.peer else {
                state.switches.remove(&dpid);
                return Err(FabricError::SwitchCreation {
                    partial: None,
                    reason: "virtual links requested without a peer".to_owned(),
                });
            };
            for _ in 0..spec.num_vlinks {
                match state.new_vlink(dpid, peer) {
                    Ok(vlink) => layout.vlinks.push(vlink),
                    Err(e) => {
                        return Err(FabricError::SwitchCreation {
                            partial: Some(dpid),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        debug!("Created switch {dpid} with {} virtual links", layout.vlinks.len());
        Ok(layout)
    }

    async fn destroy_switch(&self, dpid: Dpid) -> Result<(), FabricError> {
        let mut state = self.state.lock();
        if state.faults.destroy_switch {
            state.faults.destroy_switch = false;
            return Err(FabricError::SwitchDestruction(dpid, "injected failure".to_owned()));
        }
        let ids: Vec<VLinkId> = state.switch_mut(dpid)?.vlinks.keys().copied().collect();
        for id in ids {
            state.drop_vlink(dpid, id)?;
        }
        state.switches.remove(&dpid);
        debug!("Destroyed switch {dpid}");
        Ok(())
    }

    async fn create_virtual_link(&self, dpid: Dpid, peer: Dpid) -> Result<VLink, FabricError> {
        self.state.lock().new_vlink(dpid, peer)
    }

    async fn destroy_virtual_link(&self, dpid: Dpid, vlink: VLinkId) -> Result<(), FabricError> {
        self.state.lock().drop_vlink(dpid, vlink)
    }

    async fn add_nf_ports(
        &self,
        dpid: Dpid,
        nf: &str,
        nf_type: NfType,
        ports: &BTreeSet<u32>,
    ) -> Result<BTreeMap<u32, u32>, FabricError> {
        let mut state = self.state.lock();
        if state.faults.add_nf_ports {
            state.faults.add_nf_ports = false;
            return Err(FabricError::NfPorts(dpid, nf.to_owned(), "injected failure".to_owned()));
        }
        let switch = state.switch_mut(dpid)?;
        if switch.nfs.contains_key(nf) {
            return Err(FabricError::NfPorts(dpid, nf.to_owned(), "ports exist".to_owned()));
        }
        let mapping: BTreeMap<u32, u32> = ports.iter().map(|p| (*p, switch.new_port())).collect();
        switch.nfs.insert(nf.to_owned(), mapping.clone());
        debug!("Added {} ports of {nf} ({nf_type}) to {dpid}", mapping.len());
        Ok(mapping)
    }

    async fn destroy_nf_ports(&self, dpid: Dpid, nf: &str) -> Result<(), FabricError> {
        let mut state = self.state.lock();
        state
            .switch_mut(dpid)?
            .nfs
            .remove(nf)
            .map(|_| ())
            .ok_or_else(|| FabricError::NfPorts(dpid, nf.to_owned(), "no such ports".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsi::{ControllerAddr, LsiSpecBuilder, NfSpec};
    use pretty_assertions::assert_eq;

    fn switch0_spec() -> LsiSpec {
        LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", 6653))
            .physical_ports(BTreeMap::from([("eth0".to_owned(), "ethernet".to_owned())]))
            .build()
            .expect("Should succeed")
    }

    #[tokio::test]
    async fn test_switches_and_links() {
        let fabric = SimFabric::new(&[("eth0", "ethernet")]);
        let lsi0 = fabric.create_switch(&switch0_spec()).await.expect("Should succeed");
        assert_eq!(lsi0.physical_ports.get("eth0"), Some(&1));

        let spec = LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", 6654))
            .nfs(BTreeMap::from([(
                "fw".to_owned(),
                NfSpec {
                    nf_type: NfType::Docker,
                    ports: BTreeSet::from([1, 2]),
                },
            )]))
            .num_vlinks(2_usize)
            .peer(Some(lsi0.dpid))
            .build()
            .expect("Should succeed");
        let tenant = fabric.create_switch(&spec).await.expect("Should succeed");
        assert_eq!(tenant.vlinks.len(), 2);
        assert_eq!(fabric.num_vlinks(tenant.dpid), 2);
        assert_eq!(fabric.num_peer_ports(lsi0.dpid), 2);

        let extra = fabric
            .create_virtual_link(tenant.dpid, lsi0.dpid)
            .await
            .expect("Should succeed");
        assert_eq!(fabric.num_peer_ports(lsi0.dpid), 3);
        fabric
            .destroy_virtual_link(tenant.dpid, extra.id)
            .await
            .expect("Should succeed");
        assert_eq!(fabric.num_peer_ports(lsi0.dpid), 2);

        fabric.destroy_switch(tenant.dpid).await.expect("Should succeed");
        assert!(!fabric.switch_exists(tenant.dpid));
        assert_eq!(fabric.num_peer_ports(lsi0.dpid), 0);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let fabric = SimFabric::new(&[("eth0", "ethernet")]);
        fabric.fail_next_switch_creation(true);
        let Err(FabricError::SwitchCreation { partial, .. }) =
            fabric.create_switch(&switch0_spec()).await
        else {
            unreachable!("creation should fail");
        };
        let partial = partial.expect("Should succeed");
        assert!(fabric.switch_exists(partial));

        let lsi0 = fabric.create_switch(&switch0_spec()).await.expect("Should succeed");
        fabric.fail_vlink_creation_after(1);
        assert!(fabric.create_virtual_link(partial, lsi0.dpid).await.is_ok());
        assert!(fabric.create_virtual_link(partial, lsi0.dpid).await.is_err());
        assert!(fabric.create_virtual_link(partial, lsi0.dpid).await.is_ok());
    }
}
