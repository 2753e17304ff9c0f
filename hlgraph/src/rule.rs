// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow rules of a high-level graph

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::ids::{EndpointId, FlowId, NfPort};

/// What one side of a rule is attached to. The same variants describe where a rule matches
/// and where it sends traffic. On the action side, [`Anchor::None`] drops the traffic.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    Port(String),
    NetworkFunction(NfPort),
    Endpoint(EndpointId),
    None,
}

impl Anchor {
    #[must_use]
    pub fn port(name: impl Into<String>) -> Self {
        Anchor::Port(name.into())
    }
    #[must_use]
    pub fn nf(name: impl Into<String>, port: u32) -> Self {
        Anchor::NetworkFunction(NfPort::new(name, port))
    }
    #[must_use]
    pub fn endpoint(ep: EndpointId) -> Self {
        Anchor::Endpoint(ep)
    }
    #[must_use]
    pub fn as_endpoint(&self) -> Option<&EndpointId> {
        match self {
            Anchor::Endpoint(ep) => Some(ep),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_nf_port(&self) -> Option<&NfPort> {
        match self {
            Anchor::NetworkFunction(nfport) => Some(nfport),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_port(&self) -> Option<&str> {
        match self {
            Anchor::Port(port) => Some(port),
            _ => None,
        }
    }
}

impl Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anchor::Port(port) => write!(f, "port:{port}"),
            Anchor::NetworkFunction(nfport) => write!(f, "nf:{nfport}"),
            Anchor::Endpoint(ep) => write!(f, "endpoint:{ep}"),
            Anchor::None => write!(f, "none"),
        }
    }
}

/// Optional packet header qualifiers of a match. They are opaque to the orchestrator and
/// copied as-is to the low-level rules.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HeaderFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_dst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ether_type: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_src: Option<Ipv4Net>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_dst: Option<Ipv4Net>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_proto: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_src: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp_dst: Option<u16>,
}

impl HeaderFields {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == HeaderFields::default()
    }
}

impl Display for HeaderFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        macro_rules! field {
            ($name:literal, $value:expr) => {
                if let Some(value) = &$value {
                    write!(f, " {}={}", $name, value)?;
                }
            };
        }
        field!("eth-src", self.eth_src);
        field!("eth-dst", self.eth_dst);
        field!("vlan", self.vlan_id);
        if let Some(ethtype) = self.ether_type {
            write!(f, " ethtype={ethtype:#06x}")?;
        }
        field!("ipv4-src", self.ipv4_src);
        field!("ipv4-dst", self.ipv4_dst);
        field!("proto", self.ip_proto);
        field!("tp-src", self.tp_src);
        field!("tp-dst", self.tp_dst);
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct Match {
    pub on: Anchor,
    #[serde(flatten)]
    pub fields: HeaderFields,
}

impl Match {
    #[must_use]
    pub fn on(anchor: Anchor) -> Self {
        Self {
            on: anchor,
            fields: HeaderFields::default(),
        }
    }
    #[must_use]
    pub fn with_fields(mut self, fields: HeaderFields) -> Self {
        self.fields = fields;
        self
    }
}

pub const DEFAULT_PRIORITY: u16 = 100;

fn default_priority() -> u16 {
    DEFAULT_PRIORITY
}

/// A high-level flow rule: traffic matching `match` is sent to `action`.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct Rule {
    pub id: FlowId,
    #[serde(default = "default_priority")]
    pub priority: u16,
    #[serde(rename = "match")]
    pub r#match: Match,
    pub action: Anchor,
}

impl Rule {
    #[must_use]
    pub fn new(id: impl Into<FlowId>, on: Anchor, action: Anchor) -> Self {
        Self {
            id: id.into(),
            priority: DEFAULT_PRIORITY,
            r#match: Match::on(on),
            action,
        }
    }
    #[must_use]
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }
    #[must_use]
    pub fn with_fields(mut self, fields: HeaderFields) -> Self {
        self.r#match.fields = fields;
        self
    }
    /// The anchor this rule matches on
    #[must_use]
    pub fn matched(&self) -> &Anchor {
        &self.r#match.on
    }
    /// Endpoints this rule refers to, on either side
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointId> {
        self.matched()
            .as_endpoint()
            .into_iter()
            .chain(self.action.as_endpoint())
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "flow {} (prio {}): {}{} -> {}",
            self.id, self.priority, self.r#match.on, self.r#match.fields, self.action
        )
    }
}
