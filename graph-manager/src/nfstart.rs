// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Concurrent start of the network functions of a graph

use fabric::NfRuntime;
use hlgraph::{Graph, PortRequirements};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::errors::{GraphManagerError, GraphManagerResult};

/// What the runtime needs to start one network function
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NfStart {
    pub name: String,
    pub port_count: usize,
    pub requirements: BTreeMap<u32, PortRequirements>,
}

impl NfStart {
    /// The starts of the named network functions of a graph. Unknown names are skipped.
    pub fn from_graph<'a>(graph: &Graph, names: impl IntoIterator<Item = &'a String>) -> Vec<Self> {
        names
            .into_iter()
            .filter_map(|name| graph.network_function(name))
            .map(|nf| NfStart {
                name: nf.name.clone(),
                port_count: nf.num_ports(),
                requirements: nf.ports.clone(),
            })
            .collect()
    }
}

/// Start network functions, at most `limit` at a time. If any of them fails to start, the ones
/// that did start are stopped again.
///
/// # Errors
///
/// Returns [`GraphManagerError::NfStart`] with the names of the functions that failed.
pub async fn start_all(
    runtime: Arc<dyn NfRuntime>,
    nfs: Vec<NfStart>,
    limit: usize,
) -> GraphManagerResult<()> {
    if nfs.is_empty() {
        return Ok(());
    }
    info!("Starting {} network function(s)", nfs.len());
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();
    let mut names = HashMap::new();
    for nf in nfs {
        let runtime = runtime.clone();
        let semaphore = semaphore.clone();
        let name = nf.name.clone();
        let handle = tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };
            runtime
                .start_nf(&nf.name, nf.port_count, &nf.requirements)
                .await
        });
        names.insert(handle.id(), name);
    }

    let mut started = vec![];
    let mut failed = vec![];
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, ok) = match joined {
            Ok((id, ok)) => (id, ok),
            Err(e) => {
                error!("Network function start task failed: {e}");
                (e.id(), false)
            }
        };
        let Some(name) = names.remove(&id) else {
            continue;
        };
        if ok {
            debug!("Network function {name} started");
            started.push(name);
        } else {
            error!("Network function {name} failed to start");
            failed.push(name);
        }
    }
    if failed.is_empty() {
        return Ok(());
    }
    for name in &started {
        if !runtime.stop_nf(name).await {
            error!("Failed to stop network function {name}");
        }
    }
    failed.sort();
    Err(GraphManagerError::NfStart(failed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fabric::sim::SimNfRuntimes;
    use fabric::{Description, NfRuntimeError, NfRuntimeFactory};
    use lsi::{Dpid, NfType};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn starts(names: &[&str]) -> Vec<NfStart> {
        names
            .iter()
            .map(|name| NfStart {
                name: (*name).to_owned(),
                port_count: 2,
                requirements: BTreeMap::new(),
            })
            .collect()
    }

    #[traced_test]
    #[tokio::test]
    async fn test_start_all() {
        let runtimes = SimNfRuntimes::new(&[("fw", NfType::Docker), ("nat", NfType::Dpdk)]);
        let runtime = runtimes.runtime();
        start_all(runtime, starts(&["fw", "nat"]), 1)
            .await
            .expect("Should succeed");
        assert_eq!(runtimes.num_running(), 2);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_failed_start_stops_the_others() {
        let runtimes = SimNfRuntimes::new(&[]);
        runtimes.fail_start_of("bad");
        runtimes.fail_start_of("worse");
        let runtime = runtimes.runtime();
        let result = start_all(runtime, starts(&["fw", "worse", "nat", "bad"]), 4).await;
        assert_eq!(
            result,
            Err(GraphManagerError::NfStart(vec![
                "bad".to_owned(),
                "worse".to_owned()
            ]))
        );
        assert_eq!(runtimes.num_running(), 0);
        let mut stopped = runtimes.stopped();
        stopped.sort();
        assert_eq!(stopped, vec!["fw".to_owned(), "nat".to_owned()]);
    }

    #[derive(Default)]
    struct Gauge {
        current: usize,
        peak: usize,
    }

    struct SlowRuntime {
        gauge: Mutex<Gauge>,
    }

    #[async_trait]
    impl NfRuntime for SlowRuntime {
        async fn retrieve_description(&self, _nf: &str) -> Result<Description, NfRuntimeError> {
            Ok(Description::NotFound)
        }
        async fn select_implementation(&self) -> bool {
            true
        }
        fn nf_type(&self, _nf: &str) -> Option<NfType> {
            None
        }
        fn set_switch(&self, _dpid: Dpid) {}
        async fn start_nf(
            &self,
            _nf: &str,
            _port_count: usize,
            _requirements: &BTreeMap<u32, PortRequirements>,
        ) -> bool {
            {
                let mut gauge = self.gauge.lock();
                gauge.current += 1;
                gauge.peak = gauge.peak.max(gauge.current);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.gauge.lock().current -= 1;
            true
        }
        async fn stop_nf(&self, _nf: &str) -> bool {
            true
        }
        async fn stop_all(&self) {}
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallelism_is_bounded() {
        let runtime = Arc::new(SlowRuntime {
            gauge: Mutex::new(Gauge::default()),
        });
        start_all(runtime.clone(), starts(&["a", "b", "c", "d", "e", "f"]), 2)
            .await
            .expect("Should succeed");
        let peak = runtime.gauge.lock().peak;
        assert!(peak <= 2, "peak concurrency {peak}");
        assert!(peak >= 1);
    }
}
