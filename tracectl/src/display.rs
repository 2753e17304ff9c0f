// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display implementations

use crate::control::{TargetCfg, TargetDb};
use std::fmt::Display;

macro_rules! TARGET_FMT {
    () => {
        "{:>48} │ {:>8} │ {}"
    };
}

fn fmt_heading(f: &mut std::fmt::Formatter<'_>, title: &str) -> std::fmt::Result {
    writeln!(f)?;
    writeln!(f, "{:>40}──────── {title} ────────", "")
}

impl Display for TargetCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            format_args!(TARGET_FMT!(), self.target, self.level, self.tags.join(","))
        )
    }
}

impl Display for TargetDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_heading(f, "Tracing targets")?;
        writeln!(f, "{}", format_args!(TARGET_FMT!(), "TARGET", "LEVEL", "TAGS"))?;
        for target in self.targets.values() {
            writeln!(f, "{target}")?;
        }
        write!(
            f,
            "{}",
            format_args!(TARGET_FMT!(), "(default)", self.level, "--")
        )
    }
}

pub(crate) struct TargetDbByTag<'a>(pub(crate) &'a TargetDb);

impl Display for TargetDbByTag<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let db = self.0;
        fmt_heading(f, "Tracing targets by tag")?;
        for tag in db.tags.values() {
            writeln!(f, " {}:", tag.tag)?;
            let tagged = db
                .targets
                .values()
                .filter(|target| tag.targets.contains(target.target));
            for target in tagged {
                write!(f, "      {:<48} : {}", target.target, target.level)?;
                let others: Vec<&str> = target
                    .tags
                    .iter()
                    .copied()
                    .filter(|t| *t != tag.tag)
                    .collect();
                if !others.is_empty() {
                    write!(f, " (also: {})", others.join(" "))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::LevelFilter;
    use crate::control::TargetCfg;

    #[test]
    fn test_target_display() {
        let target = TargetCfg {
            target: "orchestrator_graph_manager",
            name: "graph-manager",
            level: LevelFilter::DEBUG,
            tags: vec!["graph", "graph-manager"],
        };
        let shown = target.to_string();
        assert!(shown.trim_start().starts_with("orchestrator_graph_manager │"));
        assert!(shown.ends_with("│ graph,graph-manager"));
        assert!(shown.contains("   debug │"));
    }
}
