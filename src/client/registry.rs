//! Client registry
//!
//! Tracks connected clients and enforces the connection cap.

use crate::client::Client;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Registry for tracking active clients
pub struct ClientRegistry {
    clients: HashMap<SocketAddr, Client>,
    max_clients: usize,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Registers a client unless the registry is full.
    ///
    /// Returns `false` when the connection must be turned away.
    pub fn try_insert(&mut self, client: Client) -> bool {
        if self.clients.len() >= self.max_clients {
            return false;
        }
        self.clients.insert(client.client_addr(), client);
        true
    }

    pub fn remove(&mut self, addr: &SocketAddr) -> Option<Client> {
        self.clients.remove(addr)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&Client> {
        self.clients.get(addr)
    }

    pub fn get_mut(&mut self, addr: &SocketAddr) -> Option<&mut Client> {
        self.clients.get_mut(addr)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_is_enforced() {
        let mut registry = ClientRegistry::new(1);
        let first: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let second: SocketAddr = "127.0.0.1:4001".parse().unwrap();

        assert!(registry.try_insert(Client::new(first)));
        assert!(!registry.try_insert(Client::new(second)));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&first).is_some());
        assert!(registry.try_insert(Client::new(second)));
        assert!(registry.get(&second).is_some());

        registry.remove(&second);
        assert!(registry.is_empty());
    }
}
