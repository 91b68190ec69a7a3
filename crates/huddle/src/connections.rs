//! Connection table: one outbound mailbox per open connection.

use dashmap::DashMap;
use huddle_protocol::ServerMessage;
use huddle_room::{DeliveryError, Outbox};
use huddle_transport::ConnectionId;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Maps each open connection to the sender half of its mailbox.
///
/// The connection's handler task owns the receiver and writes whatever
/// arrives to the socket, so handing a notification off never waits on
/// the network.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    mailboxes: DashMap<ConnectionId, UnboundedSender<ServerMessage>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a mailbox for `connection` and returns its receiving end.
    ///
    /// Opening a mailbox for a connection that already has one replaces
    /// it; the old receiver sees the channel close.
    pub fn open(&self, connection: ConnectionId) -> UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mailboxes.insert(connection, tx);
        rx
    }

    /// Removes the mailbox for `connection`, if any.
    pub fn close(&self, connection: ConnectionId) {
        self.mailboxes.remove(&connection);
    }

    /// Number of open mailboxes.
    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }
}

impl Outbox for ConnectionTable {
    fn deliver(
        &self,
        connection: ConnectionId,
        message: &ServerMessage,
    ) -> Result<(), DeliveryError> {
        let mailbox = self
            .mailboxes
            .get(&connection)
            .ok_or(DeliveryError::ConnectionGone(connection))?;
        mailbox
            .send(message.clone())
            .map_err(|_| DeliveryError::ConnectionGone(connection))
    }
}
