// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! JSON views of the state of the node

use hlgraph::Graph;
use lsi::Lsi;
use serde_json::{Value, json};

use crate::errors::{GraphManagerError, GraphManagerResult};

/// A graph as a document under a `flow-graph` key
pub fn graph_json(graph: &Graph) -> GraphManagerResult<Value> {
    let document = serde_json::to_value(graph)
        .map_err(|e| GraphManagerError::Serialization(graph.id().clone(), e.to_string()))?;
    Ok(json!({ "flow-graph": document }))
}

/// The physical ports of switch-0, each with its kind
#[must_use]
pub fn interfaces_json(lsi0: &Lsi) -> Value {
    let interfaces: Vec<Value> = lsi0
        .port_types()
        .into_iter()
        .map(|(name, kind)| json!({ "name": name, "type": kind }))
        .collect();
    json!({ "interfaces": interfaces })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlgraph::{Anchor, Rule};
    use lsi::{ControllerAddr, Dpid, LsiSpecBuilder, SwitchLayout};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn test_interfaces_json() {
        let spec = LsiSpecBuilder::default()
            .controller(ControllerAddr::new("127.0.0.1", 6653))
            .physical_ports(BTreeMap::from([("eth0".to_owned(), "ethernet".to_owned())]))
            .wireless(Some("wlan0".to_owned()))
            .build()
            .expect("Should succeed");
        let layout = SwitchLayout {
            dpid: Dpid(1),
            physical_ports: BTreeMap::from([("eth0".to_owned(), 1)]),
            wireless_port: Some(2),
            ..Default::default()
        };
        let lsi0 = Lsi::from_layout(&spec, layout).expect("Should succeed");
        assert_eq!(
            interfaces_json(&lsi0),
            json!({"interfaces": [
                {"name": "eth0", "type": "ethernet"},
                {"name": "wlan0", "type": "edge"},
            ]})
        );
    }

    #[test]
    fn test_graph_json() {
        let mut graph = Graph::new("g1");
        graph
            .add_rule(Rule::new("1", Anchor::port("eth0"), Anchor::port("eth1")))
            .expect("Should succeed");
        let value = graph_json(&graph).expect("Should succeed");
        assert_eq!(value["flow-graph"]["id"], json!("g1"));
        assert_eq!(value["flow-graph"]["rules"][0]["id"], json!("1"));
        assert_eq!(value["flow-graph"]["ports"], json!(["eth0", "eth1"]));
    }
}
