//! Open pages controlled by the worker.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;

/// A client (open page).
#[derive(Debug, Clone)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Page URL.
    pub url: String,

    /// Whether the current worker controls this page.
    pub controlled: bool,
}

/// Registry of open pages.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly opened page. New pages start uncontrolled until the
    /// worker claims them (or until their next navigation).
    pub fn open(&mut self, url: impl Into<String>) -> Client {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed));

        let client = Client {
            id: id.clone(),
            url: url.into(),
            controlled: false,
        };
        self.clients.insert(id, client.clone());
        client
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Remove a client (page closed).
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Take control of every open page immediately, without waiting for a
    /// navigation. Returns the IDs of clients that changed controller.
    pub fn claim(&mut self) -> Vec<String> {
        let mut changed = Vec::new();
        for client in self.clients.values_mut() {
            if !client.controlled {
                client.controlled = true;
                changed.push(client.id.clone());
            }
        }
        changed
    }

    /// Number of open pages.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Number of pages controlled by the current worker.
    pub fn controlled_count(&self) -> usize {
        self.clients.values().filter(|c| c.controlled).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_starts_uncontrolled() {
        let mut clients = Clients::new();
        let client = clients.open("https://example.com/");

        assert!(!client.controlled);
        assert_eq!(clients.controlled_count(), 0);
        assert!(clients.get(&client.id).is_some());
    }

    #[test]
    fn test_claim_controls_all() {
        let mut clients = Clients::new();
        let a = clients.open("https://example.com/");
        let b = clients.open("https://example.com/settings");

        let mut changed = clients.claim();
        changed.sort();
        let mut expected = vec![a.id.clone(), b.id.clone()];
        expected.sort();

        assert_eq!(changed, expected);
        assert_eq!(clients.controlled_count(), 2);
    }

    #[test]
    fn test_claim_is_idempotent() {
        let mut clients = Clients::new();
        clients.open("https://example.com/");

        assert_eq!(clients.claim().len(), 1);
        assert!(clients.claim().is_empty());
    }

    #[test]
    fn test_remove() {
        let mut clients = Clients::new();
        let client = clients.open("https://example.com/");

        assert!(clients.remove(&client.id).is_some());
        assert!(clients.is_empty());
    }
}
