// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory flow controllers. Each controller keeps the rules of its switch in a table
//! shared with the factory, keyed by the port the controller listens on.

use async_trait::async_trait;
use lsi::{ControllerAddr, FlowRule};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::controller::{ControllerFactory, FlowController};
use crate::errors::ControllerError;

#[derive(Debug, Default)]
struct ControllersState {
    rules: BTreeMap<u16, Vec<FlowRule>>,
    started: BTreeSet<u16>,
    failing_install: BTreeSet<u16>,
    failing_start: BTreeSet<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct SimControllers {
    state: Arc<Mutex<ControllersState>>,
}

impl SimControllers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Rules installed through the controller listening on `port`
    #[must_use]
    pub fn rules(&self, port: u16) -> Vec<FlowRule> {
        self.state.lock().rules.get(&port).cloned().unwrap_or_default()
    }
    #[must_use]
    pub fn rule_ids(&self, port: u16) -> BTreeSet<String> {
        self.rules(port).into_iter().map(|r| r.id).collect()
    }
    #[must_use]
    pub fn is_started(&self, port: u16) -> bool {
        self.state.lock().started.contains(&port)
    }
    /// Make every rule installation on `port` fail
    pub fn fail_install_on(&self, port: u16) {
        self.state.lock().failing_install.insert(port);
    }
    pub fn fail_start_on(&self, port: u16) {
        self.state.lock().failing_start.insert(port);
    }
}

impl ControllerFactory for SimControllers {
    fn controller(&self, addr: &ControllerAddr) -> Box<dyn FlowController> {
        Box::new(SimController {
            port: addr.port,
            state: self.state.clone(),
        })
    }
}

struct SimController {
    port: u16,
    state: Arc<Mutex<ControllersState>>,
}

#[async_trait]
impl FlowController for SimController {
    async fn start(&self) -> Result<(), ControllerError> {
        let mut state = self.state.lock();
        if state.failing_start.contains(&self.port) {
            return Err(ControllerError::Start(self.port, "injected failure".to_owned()));
        }
        state.started.insert(self.port);
        Ok(())
    }

    async fn install_rules(&self, rules: &[FlowRule]) -> Result<(), ControllerError> {
        let mut state = self.state.lock();
        if state.failing_install.contains(&self.port) {
            return Err(ControllerError::Install(self.port, "injected failure".to_owned()));
        }
        for rule in rules {
            debug!("Controller {}: installing {rule}", self.port);
        }
        state
            .rules
            .entry(self.port)
            .or_default()
            .extend(rules.iter().cloned());
        Ok(())
    }

    async fn remove_rules(&self, rules: &[FlowRule]) -> Result<(), ControllerError> {
        let mut state = self.state.lock();
        if let Some(installed) = state.rules.get_mut(&self.port) {
            installed.retain(|r| !rules.iter().any(|gone| gone.id == r.id));
        }
        Ok(())
    }

    async fn remove_rule_by_id(&self, id: &str) -> Result<(), ControllerError> {
        let mut state = self.state.lock();
        if let Some(installed) = state.rules.get_mut(&self.port) {
            installed.retain(|r| r.id != id);
        }
        Ok(())
    }
}

impl Drop for SimController {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.started.remove(&self.port);
        state.rules.remove(&self.port);
    }
}
