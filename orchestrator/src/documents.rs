// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Graph documents given on the command line. A document is either a bare graph or a graph
//! under a `flow-graph` key, as graph snapshots are.

use hlgraph::Graph;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

const WRAPPER_KEY: &str = "flow-graph";

#[derive(Debug, Error)]
pub(crate) enum DocumentError {
    #[error("Failed to read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("Bad graph document {0}: {1}")]
    Parse(String, serde_json::Error),
}

pub(crate) fn parse(text: &str) -> Result<Graph, serde_json::Error> {
    let mut value: Value = serde_json::from_str(text)?;
    if let Some(inner) = value.get_mut(WRAPPER_KEY) {
        value = inner.take();
    }
    serde_json::from_value(value)
}

pub(crate) fn load(path: &Path) -> Result<Graph, DocumentError> {
    let name = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Read(name.clone(), e))?;
    parse(&text).map_err(|e| DocumentError::Parse(name, e))
}
