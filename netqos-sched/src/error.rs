/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The uniform error value handed back to collaborators.
//!
//! [`ErrorResult`] is what crosses the boundary between the scheduling core
//! and the components that use it: handler callbacks return it, and the
//! dispatch pass collects it.  Internally the scheduler works with the typed
//! [`SchedulerError`](crate::scheduler::SchedulerError) enum, which converts
//! into an `ErrorResult` with an errno-style code.
//!
//! The process-layer specialisation (`ProcError`) is not a separate type: it
//! is an `ErrorResult` whose [`process`](ErrorResult::process) field is set.
//!
//! ```text
//! code == 0           → success
//! code != 0           → failure, message describes it
//! process.is_some()   → failure tied to an external process (ProcError)
//! ```

use std::fmt;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Code used when a failure is reported with a message only.
pub const GENERIC_ERROR_CODE: i32 = -1;

/// Upper bound on a formatted diagnostic, in bytes.
///
/// Formatted messages longer than this are truncated on a UTF-8 character
/// boundary instead of growing without limit.
pub const MAX_MESSAGE_LEN: usize = 8192;

/// errno-style codes used by the scheduling core.
pub mod codes {
    /// No such entry (unknown or already retired handle).
    pub const ENOENT: i32 = 2;
    /// Invalid argument (bad interval / alignment combination).
    pub const EINVAL: i32 = 22;
    /// Result out of range (timestamp arithmetic overflow).
    pub const ERANGE: i32 = 34;
}

// ── Process context ───────────────────────────────────────────────────────────

/// Identifies the external process a failure relates to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessContext {
    pub pid: u32,
    pub name: Option<String>,
}

impl ProcessContext {
    pub fn new(pid: u32) -> Self {
        Self { pid, name: None }
    }

    pub fn named(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "pid {} ({})", self.pid, name),
            None => write!(f, "pid {}", self.pid),
        }
    }
}

// ── ErrorResult ───────────────────────────────────────────────────────────────

/// Success, or a failure made of a numeric code and a diagnostic message.
///
/// Immutable once built and passed by value.  There is no process-wide
/// "last error": every fallible call hands back its own value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorResult {
    code: i32,
    message: String,
    process: Option<ProcessContext>,
}

impl ErrorResult {
    /// `code = 0`, empty message.
    pub fn success() -> Self {
        Self::default()
    }

    /// Failure carrying only a message; the code is [`GENERIC_ERROR_CODE`].
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            code: GENERIC_ERROR_CODE,
            message: message.into(),
            process: None,
        }
    }

    /// Failure with an explicit code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            process: None,
        }
    }

    /// A bare code with no diagnostic text.
    pub fn bare(code: i32) -> Self {
        Self {
            code,
            message: String::new(),
            process: None,
        }
    }

    /// Failure whose message is built from `args` at runtime.
    ///
    /// The message is capped at [`MAX_MESSAGE_LEN`] bytes.  Prefer the
    /// [`error_result!`](crate::error_result) macro at call sites.
    pub fn formatted(code: i32, args: fmt::Arguments<'_>) -> Self {
        let mut writer = BoundedWriter::new(MAX_MESSAGE_LEN);
        if fmt::write(&mut writer, args).is_err() {
            return Self::new(code, "error constructing error string");
        }
        Self {
            code,
            message: writer.buf,
            process: None,
        }
    }

    /// Process-layer failure (`ProcError`): code, failing pid and message.
    pub fn proc_error(code: i32, pid: u32, message: impl Into<String>) -> Self {
        Self::new(code, message).with_process(ProcessContext::new(pid))
    }

    /// Attach process context to an existing value.
    pub fn with_process(mut self, process: ProcessContext) -> Self {
        self.process = Some(process);
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn process(&self) -> Option<&ProcessContext> {
        self.process.as_ref()
    }

    /// `Ok(())` for code 0, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), ErrorResult> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code != 0 {
            write!(f, "{}: {}", self.code, self.message)?;
        } else {
            f.write_str(&self.message)?;
        }
        if let Some(process) = &self.process {
            write!(f, " [{}]", process)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorResult {}

/// Build an [`ErrorResult`] from a code and a format string.
///
/// ```rust
/// use netqos_sched::error_result;
///
/// let err = error_result!(13, "process {} missing", 4242);
/// assert_eq!(err.code(), 13);
/// assert_eq!(err.message(), "process 4242 missing");
/// ```
#[macro_export]
macro_rules! error_result {
    ($code:expr, $($arg:tt)+) => {
        $crate::error::ErrorResult::formatted($code, ::std::format_args!($($arg)+))
    };
}

// ── Bounded formatting ────────────────────────────────────────────────────────

/// `fmt::Write` sink that stops accepting text once `limit` bytes are stored.
struct BoundedWriter {
    buf: String,
    limit: usize,
    full: bool,
}

impl BoundedWriter {
    fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit,
            full: false,
        }
    }
}

impl fmt::Write for BoundedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.full {
            return Ok(());
        }
        let room = self.limit - self.buf.len();
        if s.len() <= room {
            self.buf.push_str(s);
            return Ok(());
        }
        let mut cut = room;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buf.push_str(&s[..cut]);
        self.full = true;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_zero_code_and_empty_message() {
        let ok = ErrorResult::success();
        assert!(ok.is_success());
        assert_eq!(ok.code(), 0);
        assert!(ok.message().is_empty());
        assert!(ok.process().is_none());
        assert!(ok.into_result().is_ok());
    }

    #[test]
    fn message_only_uses_generic_code() {
        let err = ErrorResult::from_message("select failed");
        assert!(!err.is_success());
        assert_eq!(err.code(), GENERIC_ERROR_CODE);
        assert_eq!(err.message(), "select failed");
    }

    #[test]
    fn explicit_code_and_message() {
        let err = ErrorResult::new(13, "process missing");
        assert_eq!(err.code(), 13);
        assert_eq!(err.to_string(), "13: process missing");
        assert_eq!(err.clone().into_result().unwrap_err(), err);
    }

    #[test]
    fn bare_code_has_empty_message() {
        let err = ErrorResult::bare(codes::EINVAL);
        assert!(!err.is_success());
        assert!(err.message().is_empty());
    }

    #[test]
    fn macro_formats_arguments() {
        let err = error_result!(5, "rule {} action {}", 12, "mark");
        assert_eq!(err.code(), 5);
        assert_eq!(err.message(), "rule 12 action mark");
    }

    #[test]
    fn formatted_message_is_bounded() {
        let long = "x".repeat(MAX_MESSAGE_LEN * 3);
        let err = error_result!(1, "{}{}", long, long);
        assert_eq!(err.message().len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 'é' is two bytes; an odd limit would split it without the boundary walk
        let text = "é".repeat(MAX_MESSAGE_LEN);
        let err = error_result!(1, "a{}", text);
        assert!(err.message().len() <= MAX_MESSAGE_LEN);
        assert!(err.message().starts_with('a'));
        assert!(err.message().len() >= MAX_MESSAGE_LEN - 1);
    }

    #[test]
    fn proc_error_carries_pid() {
        let err = ErrorResult::proc_error(3, 4242, "no such process");
        assert_eq!(err.process().map(|p| p.pid), Some(4242));
        assert_eq!(err.to_string(), "3: no such process [pid 4242]");
    }

    #[test]
    fn named_process_context_in_display() {
        let err = ErrorResult::new(3, "gone").with_process(ProcessContext::named(7, "tc"));
        assert_eq!(err.to_string(), "3: gone [pid 7 (tc)]");
    }

    #[test]
    fn display_without_code_prints_message_only() {
        // no "0: " prefix for code-less errors, as in the C++ dump()
        let err = ErrorResult::new(0, "informational");
        assert_eq!(err.to_string(), "informational");
    }
}
