// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TraceCtlError {
    #[error("Invalid tracing directive '{0}': it should be tag=level")]
    Syntax(String),
    #[error("Invalid level '{level}' for tag {tag}")]
    Level { tag: String, level: String },
    #[error("No tracing target has tag '{0}'")]
    UnknownTag(String),
}
