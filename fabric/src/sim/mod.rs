// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory collaborators, to run the orchestrator without switches or network functions

mod controller;
mod fabric;
mod nfruntime;
mod wireless;

pub use controller::SimControllers;
pub use fabric::SimFabric;
pub use nfruntime::SimNfRuntimes;
pub use wireless::SimWireless;
