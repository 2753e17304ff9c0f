// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Contract of the network function runtime. A graph gets its own runtime handle, which
//! remembers the descriptions it retrieved and the implementations it selected.

use async_trait::async_trait;
use hlgraph::PortRequirements;
use lsi::{Dpid, NfType};
use std::collections::BTreeMap;

use crate::errors::NfRuntimeError;

/// Result of looking a network function up in the repository
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Description {
    Found { implementations: Vec<NfType> },
    NotFound,
}

#[async_trait]
pub trait NfRuntime: Send + Sync {
    /// Look a network function up. An `Err` means the repository could not be queried.
    async fn retrieve_description(&self, nf: &str) -> Result<Description, NfRuntimeError>;

    /// Pick an implementation for every network function described so far
    async fn select_implementation(&self) -> bool;

    /// The selected implementation of a network function
    fn nf_type(&self, nf: &str) -> Option<NfType>;

    /// The switch the network functions of this handle attach to
    fn set_switch(&self, dpid: Dpid);

    async fn start_nf(
        &self,
        nf: &str,
        port_count: usize,
        requirements: &BTreeMap<u32, PortRequirements>,
    ) -> bool;

    async fn stop_nf(&self, nf: &str) -> bool;

    /// Stop every network function started through this handle
    async fn stop_all(&self);
}

pub trait NfRuntimeFactory: Send + Sync {
    fn runtime(&self) -> std::sync::Arc<dyn NfRuntime>;
}
