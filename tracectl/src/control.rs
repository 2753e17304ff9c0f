// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The database of tracing targets and the subscriber whose filter it drives.
//!
//! Every target carries a level and a set of tags; a target is always tagged with its own
//! name. Levels are changed per tag, and the filter of the subscriber is rebuilt and reloaded
//! after every change.

use ordermap::OrderMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

use crate::display::TargetDbByTag;
use crate::errors::TraceCtlError;
use crate::targets::TRACING_TARGETS;
use crate::trace_target;

trace_target!("tracectl", LevelFilter::INFO, &[]);

/// Key of a configuration string setting the level of events of undeclared targets
pub const DEFAULT_KEY: &str = "default";
/// Key of a configuration string setting the level of every declared target
pub const ALL_KEY: &str = "all";

fn is_reserved(key: &str) -> bool {
    key == DEFAULT_KEY || key == ALL_KEY
}

#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: Vec<&'static str>,
}

impl TargetCfg {
    fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        Self {
            target,
            name,
            level,
            tags,
        }
    }
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

#[derive(Debug, Clone)]
pub struct Tag {
    pub(crate) tag: &'static str,
    pub(crate) targets: BTreeSet<&'static str>,
}

impl Tag {
    pub fn targets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.targets.iter().copied()
    }
}

#[derive(Debug)]
pub(crate) struct TargetDb {
    pub(crate) level: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
    pub(crate) tags: OrderMap<&'static str, Tag>,
}

impl TargetDb {
    /// A database of every target declared in the linked crates
    fn new(level: LevelFilter) -> Self {
        let mut db = Self {
            level,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for target in TRACING_TARGETS {
            db.register(target.target, target.name, target.level, target.tags);
        }
        db
    }

    fn register(
        &mut self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) {
        let cfg = TargetCfg::new(target, name, level, tags);
        for &tag in &cfg.tags {
            self.tags
                .entry(tag)
                .or_insert_with(|| Tag {
                    tag,
                    targets: BTreeSet::new(),
                })
                .targets
                .insert(target);
        }
        if let Some(previous) = self.targets.insert(target, cfg) {
            warn!("Tracing target {} is declared more than once", previous.target);
        }
    }

    /// Build the filter enforcing the levels of the database. Targets that do not make valid
    /// filter directives are left to the default level.
    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new(self.level.to_string());
        for target in self.targets.values() {
            match format!("{}={}", target.target, target.level).parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => warn!("Ignoring tracing target {}: {e}", target.target),
            }
        }
        filter
    }

    /// Set the level of the targets with `tag`. Returns how many targets changed, or `None` if
    /// no target has that tag.
    fn set_tag_level(&mut self, tag: &str, level: LevelFilter) -> Option<usize> {
        let tagged = &self.tags.get(tag)?.targets;
        let mut changed = 0;
        for target in tagged {
            if let Some(cfg) = self.targets.get_mut(target)
                && cfg.level != level
            {
                cfg.level = level;
                changed += 1;
            }
        }
        Some(changed)
    }

    fn set_level_all(&mut self, level: LevelFilter) {
        for target in self.targets.values_mut() {
            target.level = level;
        }
    }

    /// Apply a parsed configuration: `default` first, then `all`, then every tag in order, so
    /// that `default=error,all=info,graph=debug` leaves the targets tagged `graph` at debug.
    /// Nothing is applied if a tag is unknown.
    fn apply(&mut self, config: &OrderMap<String, LevelFilter>) -> Result<(), TraceCtlError> {
        if let Some(tag) = config
            .keys()
            .find(|tag| !is_reserved(tag) && !self.tags.contains_key(tag.as_str()))
        {
            return Err(TraceCtlError::UnknownTag(tag.clone()));
        }
        if let Some(level) = config.get(DEFAULT_KEY) {
            self.level = *level;
        }
        if let Some(level) = config.get(ALL_KEY) {
            self.set_level_all(*level);
        }
        for (tag, level) in config.iter().filter(|(tag, _)| !is_reserved(tag)) {
            self.set_tag_level(tag, *level);
        }
        Ok(())
    }

    /// A configuration string reproducing the current levels. It sets each target by name
    /// and does not try to group targets by tag.
    pub(crate) fn as_config_string(&self) -> String {
        let mut out = format!("{DEFAULT_KEY}={}", self.level);
        for target in self.targets.values() {
            out += &format!(",{}={}", target.name, target.level);
        }
        out
    }

    fn tag_targets(&self, tag: &str) -> Vec<TargetCfg> {
        let Some(tag) = self.tags.get(tag) else {
            return vec![];
        };
        self.targets
            .values()
            .filter(|target| tag.targets.contains(target.target))
            .cloned()
            .collect()
    }
}

/// Parse comma-separated `tag=level` items, level being one of off, error, warn, info, debug
/// or trace. Empty items are ignored.
fn parse_tracing_config(input: &str) -> Result<OrderMap<String, LevelFilter>, TraceCtlError> {
    let mut config = OrderMap::new();
    for item in input.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let Some((tag, level)) = item.split_once('=') else {
            return Err(TraceCtlError::Syntax(item.to_owned()));
        };
        let (tag, level) = (tag.trim(), level.trim());
        if tag.is_empty() {
            return Err(TraceCtlError::Syntax(item.to_owned()));
        }
        let level = LevelFilter::from_str(level).map_err(|_| TraceCtlError::Level {
            tag: tag.to_owned(),
            level: level.to_owned(),
        })?;
        config.insert(tag.to_owned(), level);
    }
    Ok(config)
}

#[derive(Debug)]
pub struct TracingControl {
    db: Mutex<TargetDb>,
    reload_handle: reload::Handle<EnvFilter, Registry>,
}

impl TracingControl {
    fn new() -> Self {
        let db = TargetDb::new(LevelFilter::INFO);
        let (filter, reload_handle) = reload::Layer::new(db.env_filter());
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_level(true);

        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
        {
            // some other subscriber got installed first, which then gets the events
            warn!("Tracing levels will not be controllable: {e}");
        }
        Self {
            db: Mutex::new(db),
            reload_handle,
        }
    }

    fn reload(&self, db: &TargetDb) {
        if let Err(e) = self.reload_handle.reload(db.env_filter()) {
            error!("Failed to reload tracing filter: {e}");
        }
    }
}

static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();

/// The process-wide [`TracingControl`], created with the tracing subscriber on first use
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACING_CTL.get_or_init(TracingControl::new)
}

impl TracingControl {
    pub fn set_default_level(&self, level: LevelFilter) {
        let mut db = self.db.lock();
        if db.level != level {
            db.level = level;
            info!("Set default log level to {level}");
            self.reload(&db);
        }
    }

    #[must_use]
    pub fn get_default_level(&self) -> LevelFilter {
        self.db.lock().level
    }

    /// Configure levels from a string like `default=warn,all=info,graph=debug`
    ///
    /// # Errors
    ///
    /// Fails on malformed items, unknown levels and tags no target has. Nothing is changed
    /// then.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let config = parse_tracing_config(input)?;
        let mut db = self.db.lock();
        db.apply(&config)?;
        self.reload(&db);
        debug!("Tracing configured with '{input}'");
        Ok(())
    }

    #[must_use]
    pub fn get_target(&self, target: &str) -> Option<TargetCfg> {
        self.db.lock().targets.get(target).cloned()
    }
    pub fn get_targets_by_tag(&self, tag: &str) -> impl Iterator<Item = TargetCfg> {
        self.db.lock().tag_targets(tag).into_iter()
    }
    pub fn dump_targets_by_tag(&self) {
        let db = self.db.lock();
        info!("{}", TargetDbByTag(&db));
    }
    /// Log every target, and the configuration string that sets the current levels
    pub fn dump(&self) {
        let db = self.db.lock();
        info!("{db}\nAs configuration: {}", db.as_config_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custom_target;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    const TAG: &str = "common-tag";
    custom_target!("t1", LevelFilter::DEBUG, &[TAG]);
    custom_target!("t2", LevelFilter::ERROR, &[TAG]);
    custom_target!("t3", LevelFilter::WARN, &[TAG, "other-tag"]);

    fn level_of(db: &TargetDb, target: &str) -> Option<LevelFilter> {
        db.targets.get(target).map(|t| t.level)
    }

    #[test]
    fn test_declared_targets_are_registered() {
        // declared after use: collected at link time anyway
        let db = TargetDb::new(LevelFilter::INFO);
        assert!(db.targets.contains_key(module_path!()));
        assert!(db.targets.contains_key("late-target"));
        assert_eq!(level_of(&db, "t1"), Some(LevelFilter::DEBUG));

        let tag = db.tags.get(TAG).expect("Should succeed");
        assert_eq!(tag.targets().collect::<Vec<_>>(), vec!["t1", "t2", "t3"]);
        // every target is tagged with its name
        assert!(db.tags.contains_key("t3"));
        assert!(db.tags.contains_key("tracectl"));

        custom_target!("late-target", LevelFilter::OFF, &[]);
    }

    #[test]
    fn test_parse_tracing_config() {
        let config = parse_tracing_config("default=error, all=info,common-tag=debug,")
            .expect("Should succeed");
        assert_eq!(
            config.into_iter().collect::<Vec<_>>(),
            vec![
                ("default".to_owned(), LevelFilter::ERROR),
                ("all".to_owned(), LevelFilter::INFO),
                ("common-tag".to_owned(), LevelFilter::DEBUG),
            ]
        );
        assert_eq!(
            parse_tracing_config("common-tag=loud"),
            Err(TraceCtlError::Level {
                tag: "common-tag".to_owned(),
                level: "loud".to_owned()
            })
        );
        assert_eq!(
            parse_tracing_config("common-tag=error, foo"),
            Err(TraceCtlError::Syntax("foo".to_owned()))
        );
        assert_eq!(
            parse_tracing_config("=error"),
            Err(TraceCtlError::Syntax("=error".to_owned()))
        );
    }

    #[test]
    fn test_apply_order() {
        let mut db = TargetDb::new(LevelFilter::INFO);
        let config = parse_tracing_config("all=info,default=error,other-tag=trace")
            .expect("Should succeed");
        db.apply(&config).expect("Should succeed");
        assert_eq!(db.level, LevelFilter::ERROR);
        assert_eq!(level_of(&db, "t1"), Some(LevelFilter::INFO));
        assert_eq!(level_of(&db, "t3"), Some(LevelFilter::TRACE));

        // all or nothing
        let config = parse_tracing_config("common-tag=off,no-such-tag=debug")
            .expect("Should succeed");
        assert_eq!(
            db.apply(&config),
            Err(TraceCtlError::UnknownTag("no-such-tag".to_owned()))
        );
        assert_eq!(level_of(&db, "t1"), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_set_tag_level() {
        let mut db = TargetDb::new(LevelFilter::INFO);
        assert_eq!(db.set_tag_level(TAG, LevelFilter::WARN), Some(2));
        assert_eq!(db.set_tag_level(TAG, LevelFilter::WARN), Some(0));
        assert_eq!(db.set_tag_level("no-such-tag", LevelFilter::WARN), None);
        let config = db.as_config_string();
        assert!(config.starts_with("default=info"));
        assert!(config.contains(",t2=warn"));
    }

    #[test]
    #[serial]
    fn test_control() {
        let tctl = get_trace_ctl();
        tctl.set_default_level(LevelFilter::WARN);
        assert_eq!(tctl.get_default_level(), LevelFilter::WARN);

        tctl.setup_from_string("common-tag=off,t3=debug")
            .expect("Should succeed");
        let levels: Vec<_> = tctl
            .get_targets_by_tag(TAG)
            .map(|t| (t.target(), t.level()))
            .collect();
        assert_eq!(
            levels,
            vec![
                ("t1", LevelFilter::OFF),
                ("t2", LevelFilter::OFF),
                ("t3", LevelFilter::DEBUG),
            ]
        );
        assert!(tctl.setup_from_string("common-tag=bad").is_err());
        assert_eq!(
            tctl.get_target("t1").map(|t| t.level()),
            Some(LevelFilter::OFF)
        );
        tctl.dump();
        tctl.dump_targets_by_tag();
    }
}
