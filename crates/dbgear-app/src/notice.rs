// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl NoticeLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A transient user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: OffsetDateTime,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: OffsetDateTime::now_utc(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(mut notices) => std::mem::take(&mut *notices),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(notices) => notices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, notice: Notice) {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
    }
}

/// Process-wide "a tracked request is outstanding" flag; set while any guard is live.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlag {
    outstanding: Arc<AtomicUsize>,
}

impl LoadingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) > 0
    }

    pub fn begin(&self) -> LoadingGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        LoadingGuard {
            outstanding: Arc::clone(&self.outstanding),
            cleared: false,
        }
    }
}

/// Releases its request from the loading flag exactly once, on `finish` or drop.
#[derive(Debug)]
pub struct LoadingGuard {
    outstanding: Arc<AtomicUsize>,
    cleared: bool,
}

impl LoadingGuard {
    pub fn finish(&mut self) {
        if !self.cleared {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            self.cleared = true;
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadingFlag, Notice, NoticeLevel, NoticeLog, Notifier};

    #[test]
    fn loading_guard_clears_flag_once() {
        let flag = LoadingFlag::new();
        let mut guard = flag.begin();
        assert!(flag.is_loading());

        guard.finish();
        assert!(!flag.is_loading());

        let _second = flag.begin();
        guard.finish();
        drop(guard);
        assert!(flag.is_loading(), "stale guard must not reset a newer request");
    }

    #[test]
    fn overlapping_requests_keep_flag_until_last_finishes() {
        let flag = LoadingFlag::new();
        let shared = flag.clone();
        let first = flag.begin();
        let mut second = shared.begin();

        drop(first);
        assert!(flag.is_loading());
        second.finish();
        assert!(!flag.is_loading());
        drop(second);
        assert!(!shared.is_loading());
    }

    #[test]
    fn notice_log_drains_in_order() {
        let log = NoticeLog::new();
        log.notify(Notice::error("boom"));
        log.notify(Notice::success("saved"));

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].level, NoticeLevel::Error);
        assert_eq!(drained[1].message, "saved");
        assert!(log.snapshot().is_empty());
    }
}
