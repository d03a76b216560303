//! Module `state`
//!
//! Defines the `Client` struct tracking one control connection. Requests are
//! stateless; this only records who is connected and what they have done.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::protocol::CommandStatus;

/// Represents a connected client.
#[derive(Debug, Clone)]
pub struct Client {
    client_addr: SocketAddr,
    connected_at: Instant,
    commands_handled: u64,
    failures: u64,
}

impl Client {
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            connected_at: Instant::now(),
            commands_handled: 0,
            failures: 0,
        }
    }

    /// Count a handled command and whether it failed.
    pub fn record(&mut self, status: &CommandStatus) {
        self.commands_handled += 1;
        if matches!(status, CommandStatus::Failure(_)) {
            self.failures += 1;
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    /// Returns the client's socket address.
    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// Returns how long the client has been connected.
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn commands_handled(&self) -> u64 {
        self.commands_handled
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_failures() {
        let mut client = Client::new("127.0.0.1:4000".parse().unwrap());
        client.record(&CommandStatus::Success);
        client.record(&CommandStatus::Failure(550));
        client.record(&CommandStatus::CloseConnection);

        assert_eq!(client.commands_handled(), 3);
        assert_eq!(client.failures(), 1);
    }
}
