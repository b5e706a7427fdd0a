/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! NETQoS event scheduler – timed and periodic event dispatch core
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── error.rs        – ErrorResult / process error records
//! ├── timing/         – Timestamp, clocks, boundary alignment
//! ├── event/          – Event, EventKind, EventNames
//! ├── scheduler/      – pending set, handlers, dispatch pass
//! ├── config/         – YAML scheduler configuration
//! └── driver.rs       – tokio loop driving dispatch from the wall clock
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod timing;
