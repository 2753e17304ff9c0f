// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Model of a logical switch: its ports, the ports of the network functions attached to it,
//! its virtual links and what each virtual link is used for.

use hlgraph::{EndpointId, NfPort};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::errors::LsiError;
use crate::spec::{ControllerAddr, LsiSpec, NfType, SwitchLayout};
use crate::vlink::{Dpid, MultiIndexVLinkMap, VLink, VLinkId};

/// The kind reported for the wireless port in port listings
pub const WIRELESS_PORT_KIND: &str = "edge";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PhysicalPort {
    pub kind: String,
    pub index: u32,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct WirelessPort {
    pub name: String,
    pub index: u32,
}

/// The switch ports of one network function
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct NfPorts {
    pub nf_type: NfType,
    /// Switch port by graph port index
    pub ports: BTreeMap<u32, u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Lsi {
    dpid: Dpid,
    controller: ControllerAddr,
    physical_ports: BTreeMap<String, PhysicalPort>,
    wireless: Option<WirelessPort>,
    nfs: BTreeMap<String, NfPorts>,
    vlinks: MultiIndexVLinkMap,
    nf_vlinks: BTreeMap<NfPort, VLinkId>,
    port_vlinks: BTreeMap<String, VLinkId>,
    endpoint_vlinks: BTreeMap<EndpointId, VLinkId>,
}

impl Lsi {
    /// Build the model of a switch from the request that created it and the layout the fabric
    /// reported for it.
    ///
    /// # Errors
    ///
    /// Fails if the layout misses ports the request asked for or reports duplicate links.
    pub fn from_layout(spec: &LsiSpec, layout: SwitchLayout) -> Result<Self, LsiError> {
        let mut physical_ports = BTreeMap::new();
        for (name, kind) in &spec.physical_ports {
            let index = layout
                .physical_ports
                .get(name)
                .ok_or_else(|| LsiError::MissingPhysicalPort(name.clone()))?;
            physical_ports.insert(
                name.clone(),
                PhysicalPort {
                    kind: kind.clone(),
                    index: *index,
                },
            );
        }
        let wireless = match &spec.wireless {
            Some(name) => {
                let index = layout
                    .wireless_port
                    .ok_or_else(|| LsiError::MissingWirelessPort(name.clone()))?;
                Some(WirelessPort {
                    name: name.clone(),
                    index,
                })
            }
            None => None,
        };
        let mut lsi = Lsi {
            dpid: layout.dpid,
            controller: spec.controller.clone(),
            physical_ports,
            wireless,
            nfs: BTreeMap::new(),
            vlinks: MultiIndexVLinkMap::default(),
            nf_vlinks: BTreeMap::new(),
            port_vlinks: BTreeMap::new(),
            endpoint_vlinks: BTreeMap::new(),
        };
        for (name, nfspec) in &spec.nfs {
            let ports = layout
                .nf_ports
                .get(name)
                .ok_or_else(|| LsiError::MissingNfPorts(name.clone()))?;
            if nfspec.ports.iter().any(|p| !ports.contains_key(p)) {
                return Err(LsiError::MissingNfPorts(name.clone()));
            }
            lsi.add_nf(name, nfspec.nf_type, ports.clone())?;
        }
        for vlink in layout.vlinks {
            lsi.add_vlink(vlink)?;
        }
        Ok(lsi)
    }

    #[must_use]
    pub fn dpid(&self) -> Dpid {
        self.dpid
    }
    #[must_use]
    pub fn controller(&self) -> &ControllerAddr {
        &self.controller
    }

    /// The switch port of a physical port, which may be the wireless one
    #[must_use]
    pub fn physical_port(&self, name: &str) -> Option<u32> {
        self.physical_ports.get(name).map(|p| p.index).or_else(|| {
            self.wireless
                .as_ref()
                .filter(|w| w.name == name)
                .map(|w| w.index)
        })
    }
    #[must_use]
    pub fn physical_ports(&self) -> &BTreeMap<String, PhysicalPort> {
        &self.physical_ports
    }
    #[must_use]
    pub fn wireless(&self) -> Option<&WirelessPort> {
        self.wireless.as_ref()
    }
    #[must_use]
    pub fn has_wireless(&self) -> bool {
        self.wireless.is_some()
    }
    /// Name and kind of every physical port, wireless included
    #[must_use]
    pub fn port_types(&self) -> Vec<(String, String)> {
        self.physical_ports
            .iter()
            .map(|(name, port)| (name.clone(), port.kind.clone()))
            .chain(
                self.wireless
                    .iter()
                    .map(|w| (w.name.clone(), WIRELESS_PORT_KIND.to_owned())),
            )
            .collect()
    }

    /// Register the switch ports of a network function.
    ///
    /// # Errors
    ///
    /// Fails if the function already has ports on this switch.
    pub fn add_nf(
        &mut self,
        name: &str,
        nf_type: NfType,
        ports: BTreeMap<u32, u32>,
    ) -> Result<(), LsiError> {
        if self.nfs.contains_key(name) {
            return Err(LsiError::DuplicateNf(name.to_owned()));
        }
        debug!("{}: nf {name} ({nf_type}) has ports {ports:?}", self.dpid);
        self.nfs.insert(name.to_owned(), NfPorts { nf_type, ports });
        Ok(())
    }
    pub fn remove_nf(&mut self, name: &str) -> Option<NfPorts> {
        self.nfs.remove(name)
    }
    #[must_use]
    pub fn contains_nf(&self, name: &str) -> bool {
        self.nfs.contains_key(name)
    }
    #[must_use]
    pub fn nfs(&self) -> &BTreeMap<String, NfPorts> {
        &self.nfs
    }
    #[must_use]
    pub fn nf_type(&self, name: &str) -> Option<NfType> {
        self.nfs.get(name).map(|nf| nf.nf_type)
    }
    /// The switch port of a network function port
    #[must_use]
    pub fn nf_port(&self, nfport: &NfPort) -> Option<u32> {
        self.nfs
            .get(&nfport.nf)
            .and_then(|nf| nf.ports.get(&nfport.port))
            .copied()
    }

    /// Add a virtual link owned by this switch.
    ///
    /// # Errors
    ///
    /// Fails if the link id or its local port are already in use.
    pub fn add_vlink(&mut self, vlink: VLink) -> Result<(), LsiError> {
        let id = vlink.id;
        self.vlinks
            .try_insert(vlink)
            .map(|_| ())
            .map_err(|_| LsiError::DuplicateVLink(id))
    }
    /// Forget a virtual link. Bindings to it are not touched.
    pub fn remove_vlink(&mut self, id: VLinkId) -> Option<VLink> {
        self.vlinks.remove_by_id(&id)
    }
    #[must_use]
    pub fn vlink(&self, id: VLinkId) -> Option<&VLink> {
        self.vlinks.get_by_id(&id)
    }
    pub fn vlinks(&self) -> impl Iterator<Item = &VLink> {
        self.vlinks.iter_by_id()
    }
    #[must_use]
    pub fn num_vlinks(&self) -> usize {
        self.vlinks.len()
    }

    fn check_vlink(&self, id: VLinkId) -> Result<(), LsiError> {
        if self.vlinks.get_by_id(&id).is_none() {
            return Err(LsiError::UnknownVLink(id));
        }
        Ok(())
    }

    /// Bind a network function port to a virtual link, so traffic from switch-0 to that port
    /// goes through it.
    ///
    /// # Errors
    ///
    /// Fails if the link does not exist.
    pub fn bind_nf(&mut self, nfport: NfPort, id: VLinkId) -> Result<(), LsiError> {
        self.check_vlink(id)?;
        if let Some(previous) = self.nf_vlinks.insert(nfport.clone(), id) {
            warn!("{}: rebinding nf port {nfport} from {previous} to {id}", self.dpid);
        }
        Ok(())
    }
    /// Bind a physical port to a virtual link, so traffic from the tenant switch to that port
    /// goes through it.
    ///
    /// # Errors
    ///
    /// Fails if the link does not exist.
    pub fn bind_port(&mut self, port: &str, id: VLinkId) -> Result<(), LsiError> {
        self.check_vlink(id)?;
        if let Some(previous) = self.port_vlinks.insert(port.to_owned(), id) {
            warn!("{}: rebinding port {port} from {previous} to {id}", self.dpid);
        }
        Ok(())
    }
    /// Bind an endpoint to a virtual link, so traffic from the tenant switch to that endpoint
    /// goes through it.
    ///
    /// # Errors
    ///
    /// Fails if the link does not exist.
    pub fn bind_endpoint(&mut self, endpoint: EndpointId, id: VLinkId) -> Result<(), LsiError> {
        self.check_vlink(id)?;
        if let Some(previous) = self.endpoint_vlinks.insert(endpoint.clone(), id) {
            warn!("{}: rebinding endpoint {endpoint} from {previous} to {id}", self.dpid);
        }
        Ok(())
    }
    pub fn unbind_nf(&mut self, nfport: &NfPort) -> Option<VLinkId> {
        self.nf_vlinks.remove(nfport)
    }
    pub fn unbind_port(&mut self, port: &str) -> Option<VLinkId> {
        self.port_vlinks.remove(port)
    }
    pub fn unbind_endpoint(&mut self, endpoint: &EndpointId) -> Option<VLinkId> {
        self.endpoint_vlinks.remove(endpoint)
    }

    #[must_use]
    pub fn nf_vlink(&self, nfport: &NfPort) -> Option<&VLink> {
        self.nf_vlinks.get(nfport).and_then(|id| self.vlink(*id))
    }
    #[must_use]
    pub fn port_vlink(&self, port: &str) -> Option<&VLink> {
        self.port_vlinks.get(port).and_then(|id| self.vlink(*id))
    }
    #[must_use]
    pub fn endpoint_vlink(&self, endpoint: &EndpointId) -> Option<&VLink> {
        self.endpoint_vlinks.get(endpoint).and_then(|id| self.vlink(*id))
    }
    #[must_use]
    pub fn nf_vlinks(&self) -> &BTreeMap<NfPort, VLinkId> {
        &self.nf_vlinks
    }
    #[must_use]
    pub fn port_vlinks(&self) -> &BTreeMap<String, VLinkId> {
        &self.port_vlinks
    }
    #[must_use]
    pub fn endpoint_vlinks(&self) -> &BTreeMap<EndpointId, VLinkId> {
        &self.endpoint_vlinks
    }
    /// Tell if any binding still refers to a virtual link
    #[must_use]
    pub fn vlink_in_use(&self, id: VLinkId) -> bool {
        self.nf_vlinks.values().any(|v| *v == id)
            || self.port_vlinks.values().any(|v| *v == id)
            || self.endpoint_vlinks.values().any(|v| *v == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{LsiSpecBuilder, NfSpec};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

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
            .num_vlinks(2_usize)
            .peer(Some(Dpid(1)))
            .build()
            .expect("Should succeed");
        let layout = SwitchLayout {
            dpid: Dpid(2),
            nf_ports: BTreeMap::from([("fw".to_owned(), BTreeMap::from([(1, 1), (2, 2)]))]),
            vlinks: vec![
                VLink::new(VLinkId(1), 3, Dpid(1), 10),
                VLink::new(VLinkId(2), 4, Dpid(1), 11),
            ],
            ..Default::default()
        };
        Lsi::from_layout(&spec, layout).expect("Should succeed")
    }

    #[test]
    fn test_from_layout() {
        let lsi = tenant();
        assert_eq!(lsi.dpid(), Dpid(2));
        assert_eq!(lsi.num_vlinks(), 2);
        assert_eq!(lsi.nf_port(&NfPort::new("fw", 2)), Some(2));
        assert_eq!(lsi.nf_type("fw"), Some(NfType::Docker));
        assert_eq!(lsi.nf_port(&NfPort::new("fw", 3)), None);
        assert!(!lsi.has_wireless());
    }

    #[test]
    fn test_from_layout_missing_ports() {
        let spec = LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", 6653))
            .physical_ports(BTreeMap::from([("eth0".to_owned(), "ethernet".to_owned())]))
            .wireless(Some("wlan0".to_owned()))
            .build()
            .expect("Should succeed");
        let layout = SwitchLayout {
            dpid: Dpid(1),
            physical_ports: BTreeMap::from([("eth0".to_owned(), 1)]),
            ..Default::default()
        };
        assert_eq!(
            Lsi::from_layout(&spec, layout.clone()).map(|_| ()),
            Err(LsiError::MissingWirelessPort("wlan0".to_owned()))
        );
        let layout = SwitchLayout {
            wireless_port: Some(2),
            ..layout
        };
        let lsi = Lsi::from_layout(&spec, layout).expect("Should succeed");
        assert_eq!(lsi.physical_port("eth0"), Some(1));
        assert_eq!(lsi.physical_port("wlan0"), Some(2));
        assert_eq!(
            lsi.port_types(),
            vec![
                ("eth0".to_owned(), "ethernet".to_owned()),
                ("wlan0".to_owned(), WIRELESS_PORT_KIND.to_owned())
            ]
        );
    }

    #[test]
    fn test_bindings() {
        let mut lsi = tenant();
        let nfport = NfPort::new("fw", 1);
        lsi.bind_nf(nfport.clone(), VLinkId(1)).expect("Should succeed");
        lsi.bind_port("eth0", VLinkId(1)).expect("Should succeed");
        assert_eq!(
            lsi.bind_port("eth1", VLinkId(9)),
            Err(LsiError::UnknownVLink(VLinkId(9)))
        );
        assert_eq!(lsi.nf_vlink(&nfport).map(|v| v.remote_port), Some(10));
        assert_eq!(lsi.port_vlink("eth0").map(|v| v.local_port), Some(3));

        // a link shared by both directions stays in use until both are unbound
        assert_eq!(lsi.unbind_nf(&nfport), Some(VLinkId(1)));
        assert!(lsi.vlink_in_use(VLinkId(1)));
        assert_eq!(lsi.unbind_port("eth0"), Some(VLinkId(1)));
        assert!(!lsi.vlink_in_use(VLinkId(1)));

        assert!(lsi.remove_vlink(VLinkId(1)).is_some());
        assert_eq!(lsi.num_vlinks(), 1);
    }

    #[test]
    fn test_duplicate_vlink() {
        let mut lsi = tenant();
        assert_eq!(
            lsi.add_vlink(VLink::new(VLinkId(3), 3, Dpid(1), 12)),
            Err(LsiError::DuplicateVLink(VLinkId(3)))
        );
        lsi.add_vlink(VLink::new(VLinkId(3), 5, Dpid(1), 12))
            .expect("Should succeed");
        assert_eq!(lsi.vlinks().count(), 3);
    }
}
