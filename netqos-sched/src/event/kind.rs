/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Event kinds and their display names.
//!
//! The kind set is open: a collaborator may use any `u32` as a kind.  The
//! well-known kinds of the quality manager are provided as associated
//! constants so the built-in [`EventNames`] table can describe them.

use std::collections::BTreeMap;
use std::fmt;

// ── EventKind ─────────────────────────────────────────────────────────────────

/// Integer tag identifying what an event means to its collaborator.
///
/// The scheduler never interprets the value; it only uses it to look up
/// handlers and names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKind(pub u32);

impl EventKind {
    pub const ADD_RULES: EventKind = EventKind(0);
    pub const REMOVE_RULES: EventKind = EventKind(1);
    pub const ACTIVATE_RULES: EventKind = EventKind(2);
    pub const ADD_RULES_QOS_PROCESSOR: EventKind = EventKind(3);
    pub const RESP_ADD_RULES_QOS_PROCESSOR: EventKind = EventKind(4);
    pub const CHECK_RULES_QOS_PROCESSOR: EventKind = EventKind(5);
    pub const RESP_CHECK_RULES_QOS_PROCESSOR: EventKind = EventKind(6);
    pub const DEL_RULES_QOS_PROCESSOR: EventKind = EventKind(7);
    pub const RESP_DEL_RULES_QOS_PROCESSOR: EventKind = EventKind(8);
    pub const GET_INFO: EventKind = EventKind(9);
    pub const GET_MODINFO: EventKind = EventKind(10);
    pub const TEST: EventKind = EventKind(11);
    pub const REMOVE_RULES_CTRLCOMM: EventKind = EventKind(12);
    pub const ADD_RULES_CTRLCOMM: EventKind = EventKind(13);
    pub const PROC_MODULE_TIMER: EventKind = EventKind(14);
    pub const CTRLCOMM_TIMER: EventKind = EventKind(15);
    pub const TIMER_EXPIRED: EventKind = EventKind(16);
    pub const PERIODIC_TICK: EventKind = EventKind(17);
    pub const WATCHDOG_CHECK: EventKind = EventKind(18);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

/// Names for the well-known kinds, in kind order.
const BUILTIN_NAMES: &[(EventKind, &str)] = &[
    (EventKind::ADD_RULES, "Add-rules"),
    (EventKind::REMOVE_RULES, "Remove-rules"),
    (EventKind::ACTIVATE_RULES, "Activate-rules"),
    (EventKind::ADD_RULES_QOS_PROCESSOR, "Add Rule to QOS Processor"),
    (
        EventKind::RESP_ADD_RULES_QOS_PROCESSOR,
        "Response to add rule event in the QOS Processor",
    ),
    (EventKind::CHECK_RULES_QOS_PROCESSOR, "Check Rule to QOS Processor"),
    (
        EventKind::RESP_CHECK_RULES_QOS_PROCESSOR,
        "Response to check rule event in the QOS Processor",
    ),
    (EventKind::DEL_RULES_QOS_PROCESSOR, "Del rule in the QOS Processor"),
    (
        EventKind::RESP_DEL_RULES_QOS_PROCESSOR,
        "Response to delete rule in the QOS Processor",
    ),
    (EventKind::GET_INFO, "Get-info"),
    (EventKind::GET_MODINFO, "Get-module-info"),
    (EventKind::TEST, "Test"),
    (EventKind::REMOVE_RULES_CTRLCOMM, "Remove-rules-ctrlcomm"),
    (EventKind::ADD_RULES_CTRLCOMM, "Add-rules-ctrlcomm"),
    (EventKind::PROC_MODULE_TIMER, "Proc-module-timer"),
    (EventKind::CTRLCOMM_TIMER, "Ctrlcomm-timer"),
    (EventKind::TIMER_EXPIRED, "Timer-expired"),
    (EventKind::PERIODIC_TICK, "Periodic-tick"),
    (EventKind::WATCHDOG_CHECK, "Watchdog-check"),
];

// ── EventNames ────────────────────────────────────────────────────────────────

/// Kind → human-readable name, used in log lines and event dumps.
///
/// Built once at start-up (from the built-in table plus any names in the
/// configuration file) and owned by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNames {
    names: BTreeMap<EventKind, String>,
}

impl EventNames {
    /// An empty table; every kind falls back to `Event-<id>`.
    pub fn empty() -> Self {
        Self {
            names: BTreeMap::new(),
        }
    }

    /// The table of well-known quality-manager kinds.
    pub fn builtin() -> Self {
        Self {
            names: BUILTIN_NAMES
                .iter()
                .map(|(kind, name)| (*kind, (*name).to_string()))
                .collect(),
        }
    }

    /// Add or replace a name.  Returns the previous name, if any.
    pub fn insert(&mut self, kind: EventKind, name: impl Into<String>) -> Option<String> {
        self.names.insert(kind, name.into())
    }

    pub fn get(&self, kind: EventKind) -> Option<&str> {
        self.names.get(&kind).map(String::as_str)
    }

    /// The registered name, or `Event-<id>` for unknown kinds.
    pub fn name_of(&self, kind: EventKind) -> String {
        match self.get(kind) {
            Some(name) => name.to_string(),
            None => format!("Event-{}", kind.id()),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventKind, &str)> {
        self.names.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl Default for EventNames {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
