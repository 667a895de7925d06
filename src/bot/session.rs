use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChatSession {
    pub downloading: bool,
}

/// Per-chat state, kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct Sessions(Mutex<HashMap<i64, ChatSession>>);

impl Sessions {
    fn lock(&self) -> MutexGuard<HashMap<i64, ChatSession>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the chat's session if it doesn't exist yet.
    pub fn touch(&self, chat_id: i64) {
        self.lock().entry(chat_id).or_default();
    }

    pub fn get(&self, chat_id: i64) -> Option<ChatSession> {
        self.lock().get(&chat_id).copied()
    }

    pub fn is_downloading(&self, chat_id: i64) -> bool {
        self.get(chat_id).is_some_and(|session| session.downloading)
    }

    /// Marks the chat as busy, unless it already is.
    /// The flag is cleared when the returned permit is dropped.
    pub fn try_acquire(&self, chat_id: i64) -> Option<DownloadPermit<'_>> {
        let mut sessions = self.lock();
        let session = sessions.entry(chat_id).or_default();
        if session.downloading {
            return None;
        }
        session.downloading = true;
        Some(DownloadPermit { sessions: self, chat_id })
    }

    pub fn release(&self, chat_id: i64) {
        if let Some(session) = self.lock().get_mut(&chat_id) {
            session.downloading = false;
        }
    }
}

/// Proof that a chat's download is running; at most one exists per chat.
#[derive(Debug)]
pub struct DownloadPermit<'s> {
    sessions: &'s Sessions,
    chat_id: i64,
}

impl Drop for DownloadPermit<'_> {
    fn drop(&mut self) {
        self.sessions.release(self.chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_download_per_chat() {
        let sessions = Sessions::default();
        assert_eq!(sessions.get(1), None);

        let permit = sessions.try_acquire(1).unwrap();
        assert!(sessions.is_downloading(1));
        assert!(sessions.try_acquire(1).is_none());

        // Other chats are independent
        let other = sessions.try_acquire(2).unwrap();
        drop(other);
        assert!(!sessions.is_downloading(2));

        drop(permit);
        assert_eq!(sessions.get(1), Some(ChatSession { downloading: false }));
        assert!(sessions.try_acquire(1).is_some());
    }

    #[test]
    fn touch_keeps_a_running_download() {
        let sessions = Sessions::default();
        sessions.touch(3);
        assert_eq!(sessions.get(3), Some(ChatSession::default()));

        let _permit = sessions.try_acquire(3).unwrap();
        sessions.touch(3);
        assert!(sessions.is_downloading(3));
    }

    #[test]
    fn permit_is_released_on_panic() {
        let sessions = Sessions::default();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _permit = sessions.try_acquire(4).unwrap();
            panic!("pipeline blew up");
        }));
        assert!(res.is_err());
        assert!(!sessions.is_downloading(4));
    }
}
