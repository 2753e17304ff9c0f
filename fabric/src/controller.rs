// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Contract of the flow controllers. Every switch has its own, listening on its own port.

use async_trait::async_trait;
use lsi::{ControllerAddr, FlowRule};

use crate::errors::ControllerError;

#[async_trait]
pub trait FlowController: Send + Sync {
    async fn start(&self) -> Result<(), ControllerError>;
    async fn install_rules(&self, rules: &[FlowRule]) -> Result<(), ControllerError>;
    async fn remove_rules(&self, rules: &[FlowRule]) -> Result<(), ControllerError>;
    /// Remove a rule by id. Removing a rule that is not installed is not an error.
    async fn remove_rule_by_id(&self, id: &str) -> Result<(), ControllerError>;
}

pub trait ControllerFactory: Send + Sync {
    fn controller(&self, addr: &ControllerAddr) -> Box<dyn FlowController>;
}
