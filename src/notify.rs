//! One-shot user-visible notices (the toast channel).
//!
//! Notices are fire-and-forget: publishing with nobody listening is fine,
//! and slow listeners may miss old notices once the buffer wraps.

use tokio::sync::broadcast;

const NOTICE_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_BUFFER);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Success, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Error, message.into());
    }

    fn publish(&self, level: NoticeLevel, message: String) {
        // Err only means no receivers.
        let _ = self.tx.send(Notice { level, message });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
