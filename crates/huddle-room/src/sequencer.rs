//! The event sequencer: serialized membership changes, ordered fan-out.
//!
//! Each operation runs in two phases:
//!
//! ```text
//!  ┌─ coordinator lock ─────────────────┐
//!  │ mutate registry + directory        │
//!  │ capture snapshot, resolve targets  │
//!  └────────────┬───────────────────────┘
//!               │ (dispatch lock taken before release)
//!  ┌─ dispatch lock ────────────────────┐
//!  │ deliver to each target's outbox    │
//!  └────────────────────────────────────┘
//! ```
//!
//! No notification is delivered while the coordinator lock is held, so a
//! dead recipient never stalls another join. The dispatch lock is acquired
//! before the coordinator lock is released, which keeps deliveries in
//! commit order: nobody sees `user-disconnected(p)` before
//! `user-connected(p)`.

use huddle_protocol::{ParticipantId, RoomId, ServerMessage};
use huddle_registry::Participant;
use huddle_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::coordinator::Notification;
use crate::{Coordinator, DeliveryError, RoomError};

/// Where the sequencer hands notifications off to.
///
/// Implementations must not block: `deliver` is called once per recipient
/// in fan-out order. In the gateway this is the connection table, which
/// pushes into each connection's outbound mailbox.
pub trait Outbox: Send + Sync + 'static {
    fn deliver(
        &self,
        connection: ConnectionId,
        message: &ServerMessage,
    ) -> Result<(), DeliveryError>;
}

/// One recipient that could not be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub participant: ParticipantId,
    pub error: DeliveryError,
}

/// What happened during fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// Returns `true` if every notification reached its outbox.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of a committed join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub room_id: RoomId,
    /// Members that were in the room before the join, in join order.
    pub prior_members: Vec<ParticipantId>,
    pub report: DeliveryReport,
}

/// Result of a committed leave or disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The room the participant was in, if it had joined one.
    pub room_id: Option<RoomId>,
    /// Members still in the room, in join order.
    pub remaining: Vec<ParticipantId>,
    pub report: DeliveryReport,
}

/// Serializes every membership change through one [`Coordinator`] and fans
/// the resulting notifications out through an [`Outbox`].
pub struct EventSequencer<O: Outbox> {
    coordinator: Mutex<Coordinator>,
    dispatch: Mutex<()>,
    outbox: O,
}

impl<O: Outbox> EventSequencer<O> {
    /// Creates a sequencer with an empty registry and directory.
    pub fn new(outbox: O) -> Self {
        Self {
            coordinator: Mutex::new(Coordinator::new()),
            dispatch: Mutex::new(()),
            outbox,
        }
    }

    /// Returns the outbox notifications are delivered through.
    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    /// Registers a participant in the Connecting state. No room member is
    /// notified: a participant whose stream is not ready must not be called
    /// yet.
    ///
    /// A Connecting id held by another connection is taken over; that
    /// connection gets a 409 `error` saying so.
    ///
    /// # Errors
    /// [`RoomError::Registry`] with `DuplicateIdentifier` if the id belongs
    /// to an Active participant.
    pub async fn register(
        &self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> Result<(), RoomError> {
        let mut coordinator = self.coordinator.lock().await;
        let Some(notice) = coordinator.register(participant, connection)? else {
            return Ok(());
        };
        let baton = self.dispatch.lock().await;
        drop(coordinator);

        tracing::info!(
            participant_id = %notice.recipient,
            previous = %notice.connection,
            conn_id = %connection,
            "connecting participant taken over"
        );
        self.deliver_all(vec![notice]);
        drop(baton);
        Ok(())
    }

    /// Commits a join once the participant's media stream is ready.
    ///
    /// The joiner receives `room-joined` with the prior members, and every
    /// prior member receives `user-connected`, with no delay in between.
    ///
    /// # Errors
    /// - `UnknownParticipant` if `participant` is not registered on
    ///   `connection`.
    /// - [`RoomError::AlreadyInRoom`] if it already joined a room.
    pub async fn join(
        &self,
        room_id: RoomId,
        participant: &ParticipantId,
        connection: ConnectionId,
    ) -> Result<JoinOutcome, RoomError> {
        let mut coordinator = self.coordinator.lock().await;
        let commit = coordinator.commit_join(room_id, participant, connection)?;
        let baton = self.dispatch.lock().await;
        drop(coordinator);

        tracing::info!(
            participant_id = %participant,
            room_id = %commit.room_id,
            members = commit.prior_members.len(),
            "participant joined"
        );
        let report = self.deliver_all(commit.notifications);
        drop(baton);

        Ok(JoinOutcome {
            room_id: commit.room_id,
            prior_members: commit.prior_members,
            report,
        })
    }

    /// Explicit leave: the participant gets `room-left`, the remaining
    /// members get `user-disconnected`. The participant's registration
    /// ends too; it must `join-room` again to come back.
    ///
    /// Returns `None` if there was nothing to leave.
    pub async fn leave(
        &self,
        participant: &ParticipantId,
        connection: ConnectionId,
    ) -> Option<LeaveOutcome> {
        self.depart(participant, connection, true).await
    }

    /// Connection gone. Same as [`leave`](Self::leave) without the reply.
    ///
    /// Safe to call any number of times, for participants that never
    /// registered, and from a connection whose id has since been taken
    /// over by another connection (that call is ignored).
    pub async fn disconnect(
        &self,
        participant: &ParticipantId,
        connection: ConnectionId,
    ) -> Option<LeaveOutcome> {
        self.depart(participant, connection, false).await
    }

    /// Returns the members of a room in join order.
    pub async fn members_of(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.coordinator.lock().await.members_of(room_id)
    }

    /// Returns a copy of a participant's registry record.
    pub async fn lookup(&self, participant: &ParticipantId) -> Option<Participant> {
        self.coordinator.lock().await.lookup(participant).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.coordinator.lock().await.room_count()
    }

    pub async fn participant_count(&self) -> usize {
        self.coordinator.lock().await.participant_count()
    }

    async fn depart(
        &self,
        participant: &ParticipantId,
        connection: ConnectionId,
        acknowledge: bool,
    ) -> Option<LeaveOutcome> {
        let mut coordinator = self.coordinator.lock().await;
        let departure = coordinator.depart(participant, connection, acknowledge)?;
        let baton = self.dispatch.lock().await;
        drop(coordinator);

        if let Some(room_id) = &departure.room_id {
            tracing::info!(
                participant_id = %participant,
                %room_id,
                remaining = departure.remaining.len(),
                "participant left"
            );
        }
        let report = self.deliver_all(departure.notifications);
        drop(baton);

        Some(LeaveOutcome {
            room_id: departure.room_id,
            remaining: departure.remaining,
            report,
        })
    }

    /// Hands each notification to the outbox. A failure is logged and
    /// recorded; the rest still go out.
    fn deliver_all(&self, notifications: Vec<Notification>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for notification in notifications {
            match self
                .outbox
                .deliver(notification.connection, &notification.message)
            {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    tracing::warn!(
                        participant_id = %notification.recipient,
                        conn_id = %notification.connection,
                        %error,
                        "notification not delivered"
                    );
                    report.failures.push(DeliveryFailure {
                        participant: notification.recipient,
                        error,
                    });
                }
            }
        }
        report
    }
}
