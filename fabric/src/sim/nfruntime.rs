// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory network function runtime, backed by a catalog of known functions

use async_trait::async_trait;
use hlgraph::PortRequirements;
use lsi::{Dpid, NfType};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::NfRuntimeError;
use crate::nfruntime::{Description, NfRuntime, NfRuntimeFactory};

#[derive(Debug, Default)]
struct Repository {
    catalog: BTreeMap<String, NfType>,
    unreachable: bool,
    failing_start: BTreeSet<String>,
    failing_selection: bool,
    running: BTreeSet<(Dpid, String)>,
    stopped: Vec<String>,
}

/// Hands out runtime handles sharing one catalog and one record of running functions
#[derive(Clone, Debug, Default)]
pub struct SimNfRuntimes {
    repo: Arc<Mutex<Repository>>,
}

impl SimNfRuntimes {
    #[must_use]
    pub fn new(catalog: &[(&str, NfType)]) -> Self {
        let runtimes = Self::default();
        for (name, nf_type) in catalog {
            runtimes.add_nf(name, *nf_type);
        }
        runtimes
    }
    pub fn add_nf(&self, name: &str, nf_type: NfType) {
        self.repo.lock().catalog.insert(name.to_owned(), nf_type);
    }
    /// Make descriptions impossible to retrieve
    pub fn set_unreachable(&self, unreachable: bool) {
        self.repo.lock().unreachable = unreachable;
    }
    /// Make every start of `name` fail
    pub fn fail_start_of(&self, name: &str) {
        self.repo.lock().failing_start.insert(name.to_owned());
    }
    pub fn fail_next_selection(&self) {
        self.repo.lock().failing_selection = true;
    }
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.repo.lock().running.iter().any(|(_, nf)| nf == name)
    }
    #[must_use]
    pub fn num_running(&self) -> usize {
        self.repo.lock().running.len()
    }
    /// Functions stopped so far, in order
    #[must_use]
    pub fn stopped(&self) -> Vec<String> {
        self.repo.lock().stopped.clone()
    }
}

impl NfRuntimeFactory for SimNfRuntimes {
    fn runtime(&self) -> Arc<dyn NfRuntime> {
        Arc::new(SimNfRuntime {
            repo: self.repo.clone(),
            local: Mutex::new(Local::default()),
        })
    }
}

#[derive(Debug, Default)]
struct Local {
    described: BTreeMap<String, Vec<NfType>>,
    selected: BTreeMap<String, NfType>,
    dpid: Dpid,
    started: BTreeSet<String>,
}

struct SimNfRuntime {
    repo: Arc<Mutex<Repository>>,
    local: Mutex<Local>,
}

#[async_trait]
impl NfRuntime for SimNfRuntime {
    async fn retrieve_description(&self, nf: &str) -> Result<Description, NfRuntimeError> {
        let found = {
            let repo = self.repo.lock();
            if repo.unreachable {
                return Err(NfRuntimeError::Unreachable("simulated outage".to_owned()));
            }
            repo.catalog.get(nf).copied()
        };
        match found {
            Some(nf_type) => {
                self.local
                    .lock()
                    .described
                    .insert(nf.to_owned(), vec![nf_type]);
                Ok(Description::Found {
                    implementations: vec![nf_type],
                })
            }
            None => Ok(Description::NotFound),
        }
    }

    async fn select_implementation(&self) -> bool {
        {
            let mut repo = self.repo.lock();
            if repo.failing_selection {
                repo.failing_selection = false;
                return false;
            }
        }
        let mut local = self.local.lock();
        let Local {
            described,
            selected,
            ..
        } = &mut *local;
        for (nf, implementations) in described.iter() {
            if let Some(first) = implementations.first() {
                selected.entry(nf.clone()).or_insert(*first);
            }
        }
        true
    }

    fn nf_type(&self, nf: &str) -> Option<NfType> {
        self.local.lock().selected.get(nf).copied()
    }

    fn set_switch(&self, dpid: Dpid) {
        self.local.lock().dpid = dpid;
    }

    async fn start_nf(
        &self,
        nf: &str,
        port_count: usize,
        requirements: &BTreeMap<u32, PortRequirements>,
    ) -> bool {
        tokio::task::yield_now().await;
        let dpid = self.local.lock().dpid;
        let mut repo = self.repo.lock();
        if repo.failing_start.contains(nf) {
            warn!("Network function {nf} failed to start");
            return false;
        }
        let addressed = requirements.values().filter(|r| !r.is_empty()).count();
        debug!("Started {nf} on {dpid} with {port_count} ports ({addressed} addressed)");
        repo.running.insert((dpid, nf.to_owned()));
        drop(repo);
        self.local.lock().started.insert(nf.to_owned());
        true
    }

    async fn stop_nf(&self, nf: &str) -> bool {
        let dpid = {
            let mut local = self.local.lock();
            local.started.remove(nf);
            local.dpid
        };
        let mut repo = self.repo.lock();
        let was_running = repo.running.remove(&(dpid, nf.to_owned()));
        if was_running {
            repo.stopped.push(nf.to_owned());
        }
        was_running
    }

    async fn stop_all(&self) {
        let started: Vec<String> = self.local.lock().started.iter().cloned().collect();
        for nf in started {
            self.stop_nf(&nf).await;
        }
    }
}
