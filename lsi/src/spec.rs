// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! What a switch fabric is asked to build, and what it reports back

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use crate::vlink::{Dpid, VLink};

/// The kind of a network function, which decides the type of port the fabric gives it
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NfType {
    #[default]
    Dpdk,
    Docker,
    Kvm,
    Native,
}

/// Address of the flow controller a switch connects to
#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct ControllerAddr {
    pub address: String,
    pub port: u16,
}

impl ControllerAddr {
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl Display for ControllerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tcp:{}:{}", self.address, self.port)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct NfSpec {
    pub nf_type: NfType,
    pub ports: BTreeSet<u32>,
}

/// Request to create a switch
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
#[builder(setter(into))]
pub struct LsiSpec {
    pub controller: ControllerAddr,
    /// Physical ports the switch owns, by name, with their kind
    #[builder(default)]
    pub physical_ports: BTreeMap<String, String>,
    #[builder(default)]
    pub wireless: Option<String>,
    #[builder(default)]
    pub nfs: BTreeMap<String, NfSpec>,
    /// Number of virtual links towards `peer`
    #[builder(default)]
    pub num_vlinks: usize,
    #[builder(default)]
    pub peer: Option<Dpid>,
}

/// What the fabric reports about a switch it created
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct SwitchLayout {
    pub dpid: Dpid,
    pub physical_ports: BTreeMap<String, u32>,
    pub wireless_port: Option<u32>,
    /// Switch port of every network function port, by the index the graph uses
    pub nf_ports: BTreeMap<String, BTreeMap<u32, u32>>,
    pub vlinks: Vec<VLink>,
}
