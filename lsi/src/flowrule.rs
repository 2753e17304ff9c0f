// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Low-level flow rules, as installed on one switch

use hlgraph::HeaderFields;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LowAction {
    Output(u32),
    Drop,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct FlowRule {
    pub id: String,
    pub priority: u16,
    pub in_port: u32,
    pub fields: HeaderFields,
    pub action: LowAction,
}

impl FlowRule {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        priority: u16,
        in_port: u32,
        fields: HeaderFields,
        action: LowAction,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            in_port,
            fields,
            action,
        }
    }
}

impl Display for LowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LowAction::Output(port) => write!(f, "output:{port}"),
            LowAction::Drop => write!(f, "drop"),
        }
    }
}

impl Display for FlowRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rule {} prio {}: in_port={}{} -> {}",
            self.id, self.priority, self.in_port, self.fields, self.action
        )
    }
}
