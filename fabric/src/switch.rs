// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Contract of the switch fabric: the component that instantiates logical switches, their
//! ports and the virtual links between them.

use async_trait::async_trait;
use lsi::{Dpid, LsiSpec, NfType, SwitchLayout, VLink, VLinkId};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::FabricError;

/// A physical port as discovered on the node
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortDescriptor {
    pub kind: String,
}

impl PortDescriptor {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

#[async_trait]
pub trait SwitchFabric: Send + Sync {
    /// Physical ports available on the node, by name
    async fn discover_physical_ports(&self) -> Result<BTreeMap<String, PortDescriptor>, FabricError>;

    /// Create a switch. A failure may leave a partially created switch behind, which is then
    /// reported in [`FabricError::SwitchCreation`].
    async fn create_switch(&self, spec: &LsiSpec) -> Result<SwitchLayout, FabricError>;

    async fn destroy_switch(&self, dpid: Dpid) -> Result<(), FabricError>;

    /// Create a virtual link from switch `dpid` to switch `peer`
    async fn create_virtual_link(&self, dpid: Dpid, peer: Dpid) -> Result<VLink, FabricError>;

    async fn destroy_virtual_link(&self, dpid: Dpid, vlink: VLinkId) -> Result<(), FabricError>;

    /// Create switch ports for a network function. Returns the switch port of every
    /// requested port index.
    async fn add_nf_ports(
        &self,
        dpid: Dpid,
        nf: &str,
        nf_type: NfType,
        ports: &BTreeSet<u32>,
    ) -> Result<BTreeMap<u32, u32>, FabricError>;

    async fn destroy_nf_ports(&self, dpid: Dpid, nf: &str) -> Result<(), FabricError>;
}
