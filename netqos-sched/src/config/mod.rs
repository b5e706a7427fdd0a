//! Scheduler configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! scheduler:
//!   halt_on_error: false
//!   poll_interval_ms: 1000
//! event_names:
//!   100: "Quality-check"
//! timers:
//!   - name: "ctrlcomm"
//!     kind: 15
//!     offset_ms: 0
//!     interval_ms: 5000
//!     aligned: true
//! ```
//!
//! Every section is optional.  Timers are only validated when they are
//! turned into [`Event`]s, so a bad timer entry surfaces as a
//! [`SchedulerError`] at arming time rather than as a parse error.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::event::{Alignment, Event, EventKind, EventNames};
use crate::scheduler::{SchedulerError, SchedulerOptions};
use crate::timing::{Clock, MICROS_PER_MILLI};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchedulerConfigFile {
    #[serde(default)]
    scheduler: SchedulerSection,
    #[serde(default)]
    event_names: BTreeMap<u32, String>,
    #[serde(default)]
    timers: Vec<TimerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchedulerSection {
    #[serde(default)]
    halt_on_error: bool,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            halt_on_error: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimerEntry {
    name: String,
    kind: u32,
    #[serde(default)]
    offset_ms: u64,
    #[serde(default)]
    interval_ms: u64,
    #[serde(default)]
    aligned: bool,
}

// ── Public data structures ────────────────────────────────────────────────────

/// Global scheduler policy from the `scheduler:` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub halt_on_error: bool,
    /// Upper bound on how long the driver sleeps between passes.
    pub poll_interval_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            halt_on_error: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// A timer armed at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub name: String,
    pub kind: EventKind,
    /// Delay of the first fire relative to arming time.
    pub offset_ms: u64,
    /// Zero for a one-shot timer.
    pub interval_ms: u64,
    pub aligned: bool,
}

impl TimerConfig {
    /// Build the event for this timer, relative to the clock reading now.
    pub fn to_event<C: Clock + ?Sized>(&self, clock: &C) -> Result<Event, SchedulerError> {
        Event::after(
            self.kind,
            self.offset_ms / 1000,
            (self.offset_ms % 1000) * MICROS_PER_MILLI,
            Duration::from_millis(self.interval_ms),
            Alignment::from_flag(self.aligned),
            clock,
        )
    }
}

// ── SchedulerConfigManager ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SchedulerConfigManager {
    settings: SchedulerSettings,
    name_overrides: BTreeMap<u32, String>,
    timers: Vec<TimerConfig>,
    loaded: bool,
}

impl SchedulerConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `path`, replacing anything loaded before.
    ///
    /// # Errors
    /// The file cannot be read, the YAML is malformed, or
    /// `poll_interval_ms` is zero.  The manager is left unloaded.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading scheduler configuration from: {}", path.display());

        *self = Self::default();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: SchedulerConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        if file.scheduler.poll_interval_ms == 0 {
            bail!(
                "scheduler.poll_interval_ms must be positive in {}",
                path.display()
            );
        }

        self.settings = SchedulerSettings {
            halt_on_error: file.scheduler.halt_on_error,
            poll_interval_ms: file.scheduler.poll_interval_ms,
        };
        self.name_overrides = file.event_names;

        for entry in file.timers {
            if self.timers.iter().any(|t| t.name == entry.name) {
                warn!("Duplicate timer name '{}', keeping both", entry.name);
            }
            let timer = TimerConfig {
                name: entry.name,
                kind: EventKind::new(entry.kind),
                offset_ms: entry.offset_ms,
                interval_ms: entry.interval_ms,
                aligned: entry.aligned,
            };
            debug!(
                "  Timer: {} | kind: {} | offset: {}ms | interval: {}ms | aligned: {}",
                timer.name, timer.kind, timer.offset_ms, timer.interval_ms, timer.aligned,
            );
            self.timers.push(timer);
        }

        self.loaded = true;

        info!(
            "Loaded scheduler configuration: {} timer(s), {} name override(s), halt_on_error={}",
            self.timers.len(),
            self.name_overrides.len(),
            self.settings.halt_on_error,
        );

        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            halt_on_error: self.settings.halt_on_error,
        }
    }

    /// Built-in names with the file's `event_names` applied on top.
    pub fn names(&self) -> EventNames {
        let mut names = EventNames::builtin();
        for (id, name) in &self.name_overrides {
            names.insert(EventKind::new(*id), name.clone());
        }
        names
    }

    pub fn timers(&self) -> &[TimerConfig] {
        &self.timers
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.poll_interval_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{ManualClock, Timestamp};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const FULL: &str = r#"
scheduler:
  halt_on_error: true
  poll_interval_ms: 250
event_names:
  15: "Control-timer"
  100: "Quality-check"
timers:
  - name: "ctrlcomm"
    kind: 15
    interval_ms: 5000
    aligned: true
  - name: "startup-check"
    kind: 100
    offset_ms: 1500
"#;

    #[test]
    fn load_full_file() {
        let f = yaml_tempfile(FULL);
        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        assert!(mgr.is_loaded());
        assert!(mgr.options().halt_on_error);
        assert_eq!(mgr.poll_interval(), Duration::from_millis(250));

        let timers = mgr.timers();
        assert_eq!(timers.len(), 2);
        assert_eq!(timers[0].name, "ctrlcomm");
        assert_eq!(timers[0].kind, EventKind::CTRLCOMM_TIMER);
        assert_eq!(timers[0].offset_ms, 0);
        assert!(timers[0].aligned);
        assert_eq!(timers[1].interval_ms, 0);
        assert!(!timers[1].aligned);
    }

    #[test]
    fn event_names_override_builtin_table() {
        let f = yaml_tempfile(FULL);
        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        let names = mgr.names();
        assert_eq!(names.name_of(EventKind::CTRLCOMM_TIMER), "Control-timer");
        assert_eq!(names.name_of(EventKind::new(100)), "Quality-check");
        assert_eq!(names.name_of(EventKind::TEST), "Test");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = yaml_tempfile("{}\n");
        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        assert!(mgr.is_loaded());
        assert_eq!(mgr.settings(), &SchedulerSettings::default());
        assert_eq!(mgr.poll_interval(), Duration::from_secs(1));
        assert!(mgr.timers().is_empty());
        assert_eq!(mgr.names(), EventNames::builtin());
    }

    #[test]
    fn missing_file_returns_error() {
        let mut mgr = SchedulerConfigManager::new();
        let result = mgr.load_from_file(Path::new("/nonexistent/path/sched.yaml"));
        assert!(result.is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("timers: [ { name: x, kind: \"not a number\" } ]");
        let mut mgr = SchedulerConfigManager::new();
        assert!(mgr.load_from_file(f.path()).is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn misspelt_timer_field_is_rejected() {
        // `intervall_ms` would otherwise turn a periodic timer into a one-shot
        let f = yaml_tempfile("timers:\n  - { name: tick, kind: 17, intervall_ms: 1000 }\n");
        let mut mgr = SchedulerConfigManager::new();
        assert!(mgr.load_from_file(f.path()).is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn misspelt_scheduler_field_is_rejected() {
        let f = yaml_tempfile("scheduler:\n  halt_on_eror: true\n");
        let mut mgr = SchedulerConfigManager::new();
        assert!(mgr.load_from_file(f.path()).is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let f = yaml_tempfile("scheduler:\n  poll_interval_ms: 0\n");
        let mut mgr = SchedulerConfigManager::new();
        let err = mgr.load_from_file(f.path()).unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn reload_replaces_previous_timers() {
        let f1 = yaml_tempfile("timers:\n  - { name: a, kind: 16 }\n");
        let f2 = yaml_tempfile("timers:\n  - { name: b, kind: 17 }\n");
        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f1.path()).unwrap();
        mgr.load_from_file(f2.path()).unwrap();
        assert_eq!(mgr.timers().len(), 1);
        assert_eq!(mgr.timers()[0].name, "b");
    }

    // ── TimerConfig::to_event ─────────────────────────────────────────────────

    #[test]
    fn timer_offset_is_split_into_seconds_and_micros() {
        let clock = ManualClock::new(Timestamp::from_micros(10_000_000));
        let timer = TimerConfig {
            name: "startup".into(),
            kind: EventKind::TIMER_EXPIRED,
            offset_ms: 1_500,
            interval_ms: 0,
            aligned: false,
        };
        let ev = timer.to_event(&clock).unwrap();
        assert_eq!(ev.due(), Timestamp::from_micros(11_500_000));
        assert!(!ev.is_periodic());
    }

    #[test]
    fn aligned_timer_lands_on_boundary() {
        let clock = ManualClock::new(Timestamp::from_micros(37_000_000));
        let timer = TimerConfig {
            name: "tick".into(),
            kind: EventKind::PERIODIC_TICK,
            offset_ms: 0,
            interval_ms: 60_000,
            aligned: true,
        };
        let ev = timer.to_event(&clock).unwrap();
        assert_eq!(ev.due(), Timestamp::from_micros(60_000_000));
    }

    #[test]
    fn aligned_one_shot_timer_is_rejected_when_armed() {
        let clock = ManualClock::new(Timestamp::EPOCH);
        let timer = TimerConfig {
            name: "bad".into(),
            kind: EventKind::TEST,
            offset_ms: 0,
            interval_ms: 0,
            aligned: true,
        };
        assert_eq!(
            timer.to_event(&clock).unwrap_err(),
            SchedulerError::AlignmentWithoutInterval
        );
    }
}
