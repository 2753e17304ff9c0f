// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration of the graph manager

use derive_builder::Builder;
use std::fmt::Display;

/// Parameters of a [`crate::GraphManager`]. Built with [`GraphManagerParamsBuilder`], which
/// provides defaults for every field.
#[derive(Builder, Clone, Debug, PartialEq, Eq)]
pub struct GraphManagerParams {
    /// Address flow controllers listen on
    #[builder(setter(into), default = "127.0.0.1".to_string())]
    pub controller_address: String,

    /// Port of the controller of switch-0. Tenant controllers get the following ones.
    #[builder(setter(into), default = 6653)]
    pub first_controller_port: u16,

    /// Wireless interface to bridge with switch-0, if any
    #[builder(setter(into), default)]
    pub wireless: Option<String>,

    /// Upper bound of network functions started concurrently
    #[builder(setter(into), default = 8)]
    pub max_parallel_nf_starts: usize,
}

impl Default for GraphManagerParams {
    fn default() -> Self {
        Self {
            controller_address: "127.0.0.1".to_string(),
            first_controller_port: 6653,
            wireless: None,
            max_parallel_nf_starts: 8,
        }
    }
}

impl Display for GraphManagerParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        writeln!(f, "Graph manager config")?;
        writeln!(f, "  controllers : {}:{}..", self.controller_address, self.first_controller_port)?;
        writeln!(f, "  wireless    : {}", self.wireless.as_deref().unwrap_or("--"))?;
        writeln!(f, "  nf starts   : {} at a time", self.max_parallel_nf_starts)
    }
}
