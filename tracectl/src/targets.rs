// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Targets declared across all linked crates, collected at link time

use crate::LevelFilter;
use linkme::distributed_slice;

/// A tracing target as declared by [`trace_target!`](crate::trace_target) or
/// [`custom_target!`](crate::custom_target)
pub struct STarget {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: &'static [&'static str],
}

impl STarget {
    #[must_use]
    pub const fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}

#[allow(unsafe_code)] // linkme places the slice in a dedicated link section
#[distributed_slice]
pub static TRACING_TARGETS: [STarget];

/// Declare the calling module as a tracing target, with a display name, a default level and
/// tags. The expansion is wrapped in an anonymous const so that the macro can be used several
/// times in a crate without clashing statics.
#[macro_export]
macro_rules! trace_target {
    ($name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            use $crate::LevelFilter;
            use $crate::targets::{STarget, TRACING_TARGETS};

            #[allow(unsafe_code)] // linkme places the entry in a dedicated link section
            #[linkme::distributed_slice(TRACING_TARGETS)]
            static TRACE_TGT: STarget = STarget::new(module_path!(), $name, $level, $tags);
        };
    };
}

/// Declare a tracing target by name rather than after the calling module
#[macro_export]
macro_rules! custom_target {
    ($target:expr, $level:expr, $tags:expr) => {
        const _: () = {
            use $crate::LevelFilter;
            use $crate::targets::{STarget, TRACING_TARGETS};

            #[allow(unsafe_code)] // linkme places the entry in a dedicated link section
            #[linkme::distributed_slice(TRACING_TARGETS)]
            static TRACE_TGT: STarget = STarget::new($target, $target, $level, $tags);
        };
    };
}
