//! User-facing notifications (toasts).
//!
//! The session never renders anything itself; it hands notifications to a
//! [`Notifier`]. [`NotificationStore`] keeps them in memory for frontends
//! that poll and for tests.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub timestamp: SystemTime,
    pub level: NotificationLevel,
    pub title: String,
    pub description: Option<String>,
    /// Stays on screen until dismissed
    pub persistent: bool,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            level,
            title: title.into(),
            description: None,
            persistent: false,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, title)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

#[derive(Clone)]
pub struct NotificationStore {
    entries: Arc<Mutex<Vec<Notification>>>,
    max_entries: usize,
}

impl NotificationStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            max_entries,
        }
    }

    pub fn add_entry(&self, entry: Notification) {
        let mut entries = self.entries.lock();
        entries.push(entry);

        // FIFO eviction when exceeding max
        if entries.len() > self.max_entries {
            entries.remove(0);
        }
    }

    pub fn get_all_entries(&self) -> Vec<Notification> {
        self.entries.lock().clone()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count(NotificationLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(NotificationLevel::Warning)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Notifier for NotificationStore {
    fn notify(&self, notification: Notification) {
        self.add_entry(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction() {
        let store = NotificationStore::new(2);
        store.notify(Notification::error("one"));
        store.notify(Notification::warning("two"));
        store.notify(Notification::error("three"));

        let titles: Vec<String> = store.get_all_entries().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["two", "three"]);
        assert_eq!(store.error_count(), 1);
        assert_eq!(store.warning_count(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let store = NotificationStore::default();
        let handle = store.clone();
        handle.notify(Notification::warning("offline").persistent());

        let entries = store.get_all_entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].persistent);
        store.clear();
        assert!(handle.get_all_entries().is_empty());
    }
}
