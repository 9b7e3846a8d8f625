//! Transient user-facing notices for the outcome of a user action.

use std::collections::VecDeque;
use std::fmt;

use crate::error::FormError;
use crate::form::SubmitOutcome;

const HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn for_submit(result: &Result<SubmitOutcome, FormError>) -> Self {
        match result {
            Ok(SubmitOutcome::Created(_)) => Notice::info("Application added!"),
            Ok(SubmitOutcome::Updated(_)) => Notice::info("Application updated!"),
            Err(err) => Notice::for_error(err),
        }
    }

    pub fn for_delete(result: &Result<(), FormError>) -> Self {
        match result {
            Ok(()) => Notice::info("Application deleted."),
            Err(err) => Notice::for_error(err),
        }
    }

    pub fn for_subscription(reason: &str) -> Self {
        Notice::error(format!("Live updates interrupted: {reason}"))
    }

    pub fn disconnected() -> Self {
        Notice::error("Live updates stopped: the store went away. Showing the last loaded data.")
    }

    fn for_error(err: &FormError) -> Self {
        match err {
            FormError::Validation { missing } => {
                Notice::error(format!("Please fill in all fields! (missing: {})", missing.join(", ")))
            }
            FormError::NotAuthenticated => Notice::error("User not authenticated!"),
            FormError::Write(e) => Notice::error(format!("Failed to save application: {e}")),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Most recent notices, newest last. Only the newest is shown.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: VecDeque<Notice>,
    showing: bool,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        if notice.is_error() {
            tracing::warn!(message = %notice.message, "notice");
        }
        if self.notices.len() == HISTORY {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
        self.showing = true;
    }

    /// The notice currently on screen, if it has not been dismissed.
    pub fn current(&self) -> Option<&Notice> {
        self.notices.back().filter(|_| self.showing)
    }

    pub fn dismiss(&mut self) {
        self.showing = false;
    }

    pub fn history(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn error_count(&self) -> usize {
        self.notices.iter().filter(|n| n.is_error()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn messages_match_the_action_outcome() {
        let created = Notice::for_submit(&Ok(SubmitOutcome::Created("r1".into())));
        assert_eq!(created, Notice::info("Application added!"));

        let missing = Notice::for_submit(&Err(FormError::Validation { missing: vec!["name"] }));
        assert_eq!(missing.message, "Please fill in all fields! (missing: name)");
        assert!(missing.is_error());

        let auth = Notice::for_delete(&Err(FormError::NotAuthenticated));
        assert_eq!(auth.message, "User not authenticated!");

        let write = Notice::for_submit(&Err(FormError::Write(StoreError::Rejected("offline".into()))));
        assert_eq!(write.message, "Failed to save application: write rejected: offline");
    }

    #[test]
    fn board_shows_newest_until_dismissed() {
        let mut board = NoticeBoard::new();
        assert!(board.current().is_none());
        board.push(Notice::info("one"));
        board.push(Notice::error("two"));
        assert_eq!(board.current().map(|n| n.message.as_str()), Some("two"));
        board.dismiss();
        assert!(board.current().is_none());
        assert_eq!(board.error_count(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let mut board = NoticeBoard::new();
        for i in 0..30 {
            board.push(Notice::info(i.to_string()));
        }
        assert_eq!(board.history().count(), HISTORY);
        assert_eq!(board.history().next().map(|n| n.message.as_str()), Some("10"));
    }

    #[test]
    fn disconnect_notice_is_an_error() {
        let notice = Notice::disconnected();
        assert!(notice.is_error());
        assert!(notice.message.starts_with("Live updates stopped"));
    }
}
