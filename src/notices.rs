//! User-facing notices ("toasts").
//!
//! Components push notices into an unbounded channel; the shell drains it and
//! renders them. A closed receiver is not an error.

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Notices {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notices {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn push(&self, level: NoticeLevel, title: impl Into<String>, description: Option<String>) {
        let notice = Notice {
            level,
            title: title.into(),
            description,
        };
        if let Some(tx) = &self.tx {
            if tx.send(notice).is_err() {
                tracing::debug!("Notice receiver dropped");
            }
        }
    }

    pub fn success(&self, title: impl Into<String>, description: impl Into<String>) {
        self.push(NoticeLevel::Success, title, Some(description.into()));
    }

    pub fn info(&self, title: impl Into<String>) {
        self.push(NoticeLevel::Info, title, None);
    }

    pub fn error(&self, title: impl Into<String>, description: impl Into<String>) {
        self.push(NoticeLevel::Error, title, Some(description.into()));
    }
}
