use std::collections::HashMap;

use super::thread::Thread;

/// Local copy of the thread list shown next to the chat
pub struct ThreadsStore {
    threads: HashMap<String, Thread>,
    active_thread_id: Option<String>,
}

impl ThreadsStore {
    pub fn new() -> Self {
        Self {
            threads: HashMap::new(),
            active_thread_id: None,
        }
    }

    /// Add or replace a thread
    pub fn upsert(&mut self, thread: Thread) {
        self.threads.insert(thread.thread_id.clone(), thread);
    }

    /// Replace the whole list with a fresh search result
    pub fn replace_all(&mut self, threads: Vec<Thread>) {
        self.threads = threads
            .into_iter()
            .map(|t| (t.thread_id.clone(), t))
            .collect();
    }

    pub fn get(&self, id: &str) -> Option<&Thread> {
        self.threads.get(id)
    }

    /// Record a persisted title. Returns false for unknown threads.
    pub fn set_title(&mut self, id: &str, title: &str) -> bool {
        match self.threads.get_mut(id) {
            Some(thread) => {
                thread.set_title(title);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.threads.remove(id).is_some();
        if self.active_thread_id.as_deref() == Some(id) {
            self.active_thread_id = None;
        }
        removed
    }

    pub fn set_active(&mut self, id: Option<String>) {
        self.active_thread_id = id;
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_thread_id.as_deref()
    }

    /// All threads, most recently updated first
    pub fn list_all(&self) -> Vec<&Thread> {
        let mut threads: Vec<&Thread> = self.threads.values().collect();
        threads.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        threads
    }

    /// `(thread_id, display title)` pairs in list order
    pub fn display_titles(&self) -> Vec<(String, String)> {
        self.list_all()
            .into_iter()
            .map(|t| (t.thread_id.clone(), t.display_title()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.threads.len()
    }
}

impl Default for ThreadsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(id: &str, updated_at: &str) -> Thread {
        let mut t = Thread::new(id);
        t.updated_at = Some(updated_at.to_string());
        t
    }

    #[test]
    fn test_list_sorted_by_updated_at_desc() {
        let mut store = ThreadsStore::new();
        store.upsert(thread("a", "2024-01-01T00:00:00Z"));
        store.upsert(thread("b", "2024-03-01T00:00:00Z"));
        store.upsert(thread("c", "2024-02-01T00:00:00Z"));

        let ids: Vec<&str> = store.list_all().iter().map(|t| t.thread_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_set_title_updates_display() {
        let mut store = ThreadsStore::new();
        store.upsert(Thread::new("a"));
        assert_eq!(store.display_titles()[0].1, "Untitled chat");

        assert!(store.set_title("a", "Trip plan"));
        assert!(!store.set_title("missing", "x"));
        assert_eq!(store.display_titles()[0].1, "Trip plan");
    }

    #[test]
    fn test_remove_clears_active() {
        let mut store = ThreadsStore::new();
        store.upsert(Thread::new("a"));
        store.set_active(Some("a".into()));

        assert!(store.remove("a"));
        assert_eq!(store.active_id(), None);
        assert_eq!(store.count(), 0);
    }
}
