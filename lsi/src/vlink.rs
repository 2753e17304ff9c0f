// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Virtual links between a tenant switch and switch-0

use multi_index_map::MultiIndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Datapath id of a logical switch
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Dpid(pub u64);

impl Display for Dpid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Identity of a virtual link, unique within the switch that owns it
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VLinkId(pub u64);

impl Display for VLinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vlink-{}", self.0)
    }
}

/// A point-to-point link: `local_port` lives on the switch that owns the link, `remote_port`
/// on the peer switch `remote_dpid`.
#[derive(Clone, Debug, Eq, Hash, MultiIndexMap, PartialEq, Deserialize, Serialize)]
#[multi_index_derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VLink {
    #[multi_index(ordered_unique)]
    pub id: VLinkId,
    #[multi_index(hashed_unique)]
    pub local_port: u32,
    pub remote_dpid: Dpid,
    pub remote_port: u32,
}

impl VLink {
    #[must_use]
    pub fn new(id: VLinkId, local_port: u32, remote_dpid: Dpid, remote_port: u32) -> Self {
        Self {
            id,
            local_port,
            remote_dpid,
            remote_port,
        }
    }
}

impl Display for VLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (local port {} <-> port {} of {})",
            self.id, self.local_port, self.remote_port, self.remote_dpid
        )
    }
}
