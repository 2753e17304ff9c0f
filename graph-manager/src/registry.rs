// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Registry of the endpoints graphs export to each other.
//!
//! An endpoint defined by a graph is published on the switch-0 port through which it is
//! reached: the port traffic *to* the endpoint must be sent to when the definer matches on
//! it (`defined_in_matches`), and the port traffic *from* the endpoint arrives on when the
//! definer sends to it (`defined_in_actions`). Every published endpoint carries the number
//! of other graphs that refer to it.
//!
//! An endpoint its definer is removing is retired first: it stays published for the definer's
//! own teardown but no other graph can start using it.

use hlgraph::EndpointId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Clone, Debug, Default, Serialize)]
pub struct EndpointRegistry {
    available: BTreeMap<EndpointId, u32>,
    defined_in_matches: BTreeMap<EndpointId, u32>,
    defined_in_actions: BTreeMap<EndpointId, u32>,
    retiring: BTreeSet<EndpointId>,
}

impl EndpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish that traffic to `endpoint` is to be sent to `port` of switch-0
    pub fn publish_in_match(&mut self, endpoint: &EndpointId, port: u32) {
        debug!("Endpoint {endpoint} is reached via port {port} of switch-0");
        self.defined_in_matches.insert(endpoint.clone(), port);
        self.available.entry(endpoint.clone()).or_insert(0);
    }
    /// Publish that traffic from `endpoint` arrives on `port` of switch-0
    pub fn publish_in_action(&mut self, endpoint: &EndpointId, port: u32) {
        debug!("Endpoint {endpoint} delivers via port {port} of switch-0");
        self.defined_in_actions.insert(endpoint.clone(), port);
        self.available.entry(endpoint.clone()).or_insert(0);
    }

    /// Record one more graph using an endpoint. Returns false if the endpoint is unknown or
    /// retiring.
    pub fn acquire(&mut self, endpoint: &EndpointId) -> bool {
        if self.retiring.contains(endpoint) {
            return false;
        }
        match self.available.get_mut(endpoint) {
            Some(count) => {
                *count += 1;
                debug!("Endpoint {endpoint} is now used by {count} graph(s)");
                true
            }
            None => false,
        }
    }
    /// Record one graph less using an endpoint
    pub fn release(&mut self, endpoint: &EndpointId) {
        match self.available.get_mut(endpoint) {
            Some(count) if *count > 0 => {
                *count -= 1;
                debug!("Endpoint {endpoint} is now used by {count} graph(s)");
            }
            Some(_) => warn!("Endpoint {endpoint} released more often than acquired"),
            None => warn!("Released unknown endpoint {endpoint}"),
        }
    }

    /// Stop publishing where traffic to `endpoint` goes
    pub fn withdraw_in_match(&mut self, endpoint: &EndpointId) {
        debug!("Endpoint {endpoint} is no longer reachable");
        self.defined_in_matches.remove(endpoint);
    }
    /// Stop publishing where traffic from `endpoint` arrives
    pub fn withdraw_in_action(&mut self, endpoint: &EndpointId) {
        debug!("Endpoint {endpoint} no longer delivers");
        self.defined_in_actions.remove(endpoint);
    }

    /// Close an endpoint to new users
    pub fn retire(&mut self, endpoint: &EndpointId) {
        debug!("Endpoint {endpoint} is retiring");
        self.retiring.insert(endpoint.clone());
    }
    /// Open a retiring endpoint to new users again
    pub fn reinstate(&mut self, endpoint: &EndpointId) {
        if self.retiring.remove(endpoint) {
            debug!("Endpoint {endpoint} is reinstated");
        }
    }

    /// Forget an endpoint entirely
    pub fn purge(&mut self, endpoint: &EndpointId) {
        debug!("Removing endpoint {endpoint}");
        self.available.remove(endpoint);
        self.defined_in_matches.remove(endpoint);
        self.defined_in_actions.remove(endpoint);
        self.retiring.remove(endpoint);
    }

    /// Tell if other graphs may use an endpoint
    #[must_use]
    pub fn contains(&self, endpoint: &EndpointId) -> bool {
        self.available.contains_key(endpoint) && !self.retiring.contains(endpoint)
    }
    #[must_use]
    pub fn usage(&self, endpoint: &EndpointId) -> Option<u32> {
        self.available.get(endpoint).copied()
    }
    /// Port of switch-0 to send traffic for `endpoint` to
    #[must_use]
    pub fn match_port(&self, endpoint: &EndpointId) -> Option<u32> {
        self.defined_in_matches.get(endpoint).copied()
    }
    /// Port of switch-0 traffic from `endpoint` arrives on
    #[must_use]
    pub fn action_port(&self, endpoint: &EndpointId) -> Option<u32> {
        self.defined_in_actions.get(endpoint).copied()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.available.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_does_not_reset_usage() {
        let ep: EndpointId = "g1:ep".parse().expect("Should succeed");
        let mut registry = EndpointRegistry::new();
        assert!(!registry.acquire(&ep));

        registry.publish_in_action(&ep, 12);
        assert_eq!(registry.usage(&ep), Some(0));
        assert!(registry.acquire(&ep));
        assert!(registry.acquire(&ep));

        registry.publish_in_match(&ep, 13);
        assert_eq!(registry.usage(&ep), Some(2));
        assert_eq!(registry.action_port(&ep), Some(12));
        assert_eq!(registry.match_port(&ep), Some(13));

        registry.release(&ep);
        assert_eq!(registry.usage(&ep), Some(1));

        registry.purge(&ep);
        assert!(!registry.contains(&ep));
        assert_eq!(registry.match_port(&ep), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_retiring_endpoint_takes_no_users() {
        let ep: EndpointId = "g1:ep".parse().expect("Should succeed");
        let mut registry = EndpointRegistry::new();
        registry.publish_in_match(&ep, 4);

        registry.retire(&ep);
        assert!(!registry.contains(&ep));
        assert!(!registry.acquire(&ep));
        assert_eq!(registry.usage(&ep), Some(0));
        // still published for the definer
        assert_eq!(registry.match_port(&ep), Some(4));

        registry.reinstate(&ep);
        assert!(registry.acquire(&ep));
        assert_eq!(registry.usage(&ep), Some(1));

        registry.retire(&ep);
        registry.purge(&ep);
        registry.publish_in_match(&ep, 5);
        assert!(registry.contains(&ep));
    }
}
