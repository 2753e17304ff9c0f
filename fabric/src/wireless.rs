// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bridging of the wireless port of switch-0 with the real wireless interface of the node

use async_trait::async_trait;
use lsi::Dpid;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info};

#[async_trait]
pub trait WirelessControl: Send + Sync {
    async fn attach(&self, dpid: Dpid, iface: &str) -> bool;
    async fn detach(&self, dpid: Dpid, iface: &str) -> bool;
}

/// Attaches and detaches by running external commands, called with the datapath id of the
/// switch and the name of the interface. Success is the exit status of the command.
#[derive(Clone, Debug)]
pub struct ShellWireless {
    attach_cmd: PathBuf,
    detach_cmd: PathBuf,
}

impl ShellWireless {
    pub const DEFAULT_ATTACH: &'static str = "./attach_wireless_interface.sh";
    pub const DEFAULT_DETACH: &'static str = "./detach_wireless_interface.sh";

    #[must_use]
    pub fn new(attach_cmd: impl Into<PathBuf>, detach_cmd: impl Into<PathBuf>) -> Self {
        Self {
            attach_cmd: attach_cmd.into(),
            detach_cmd: detach_cmd.into(),
        }
    }

    async fn run(cmd: &Path, dpid: Dpid, iface: &str) -> bool {
        debug!("Executing {} {} {iface}", cmd.display(), dpid.0);
        match Command::new(cmd)
            .arg(dpid.0.to_string())
            .arg(iface)
            .status()
            .await
        {
            Ok(status) if status.success() => true,
            Ok(status) => {
                error!("{} {iface} exited with {status}", cmd.display());
                false
            }
            Err(e) => {
                error!("Failed to execute {}: {e}", cmd.display());
                false
            }
        }
    }
}

impl Default for ShellWireless {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTACH, Self::DEFAULT_DETACH)
    }
}

#[async_trait]
impl WirelessControl for ShellWireless {
    async fn attach(&self, dpid: Dpid, iface: &str) -> bool {
        info!("Attaching wireless interface {iface} to {dpid}...");
        Self::run(&self.attach_cmd, dpid, iface).await
    }
    async fn detach(&self, dpid: Dpid, iface: &str) -> bool {
        info!("Detaching wireless interface {iface} from {dpid}...");
        Self::run(&self.detach_cmd, dpid, iface).await
    }
}
