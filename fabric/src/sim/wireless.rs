// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use async_trait::async_trait;
use lsi::Dpid;
use parking_lot::Mutex;
use std::collections::BTreeSet;

use crate::wireless::WirelessControl;

#[derive(Debug, Default)]
pub struct SimWireless {
    attached: Mutex<BTreeSet<(Dpid, String)>>,
    refuse: Mutex<bool>,
}

impl SimWireless {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Make attachments fail
    pub fn refuse_attach(&self) {
        *self.refuse.lock() = true;
    }
    #[must_use]
    pub fn is_attached(&self, dpid: Dpid, iface: &str) -> bool {
        self.attached.lock().contains(&(dpid, iface.to_owned()))
    }
}

#[async_trait]
impl WirelessControl for SimWireless {
    async fn attach(&self, dpid: Dpid, iface: &str) -> bool {
        if *self.refuse.lock() {
            return false;
        }
        self.attached.lock().insert((dpid, iface.to_owned()))
    }
    async fn detach(&self, dpid: Dpid, iface: &str) -> bool {
        self.attached.lock().remove(&(dpid, iface.to_owned()))
    }
}
