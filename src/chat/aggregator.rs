//! Turn aggregation and the single in-flight reply slot

use tokio_util::sync::CancellationToken;

use super::turn::{ChatTurn, MessageSender};

/// Aggregation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    NoOpenTurn,
    OpenTurn(MessageSender),
}

/// Identifies the reply currently occupying the slot
#[derive(Debug, Clone)]
pub struct ReplyTicket {
    id: u64,
    cancel: CancellationToken,
}

impl ReplyTicket {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Fires when the reply should be abandoned
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[derive(Debug, Default)]
struct ReplySlot {
    next_id: u64,
    current: Option<ReplyTicket>,
}

impl ReplySlot {
    fn occupy(&mut self, cancel: CancellationToken) -> ReplyTicket {
        self.next_id += 1;
        let ticket = ReplyTicket {
            id: self.next_id,
            cancel,
        };
        self.current = Some(ticket.clone());
        ticket
    }

    fn release(&mut self, id: u64) -> bool {
        match &self.current {
            Some(ticket) if ticket.id == id => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    fn cancel(&mut self) -> bool {
        self.current.take().is_some_and(|ticket| {
            ticket.cancel.cancel();
            true
        })
    }
}

/// Result of an end-of-user-turn signal
#[derive(Debug)]
pub enum EndOfTurn {
    /// Generate a reply to `utterance`, then report back with the ticket
    Dispatch {
        utterance: String,
        /// Turns before the utterance, oldest first
        history: Vec<ChatTurn>,
        ticket: ReplyTicket,
    },
    /// A reply is already in flight
    Busy,
    /// The open turn (if any) is not the user's
    NoUserTurn,
}

/// Stitches partial chunks into turns and gates reply generation
///
/// At most one turn is open and at most one reply is in flight. Closed turns
/// are never modified.
#[derive(Debug)]
pub struct TurnAggregator {
    turns: Vec<ChatTurn>,
    state: TurnState,
    slot: ReplySlot,
    cancel: CancellationToken,
}

impl Default for TurnAggregator {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl TurnAggregator {
    /// Reply tickets get child tokens of `cancel`
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            turns: Vec::new(),
            state: TurnState::NoOpenTurn,
            slot: ReplySlot::default(),
            cancel,
        }
    }

    /// Record a chunk of text from `sender`
    pub fn push_chunk(&mut self, sender: MessageSender, chunk: &str) {
        if self.state == TurnState::OpenTurn(sender) {
            if let Some(turn) = self.turns.last_mut() {
                turn.content.push_str(chunk);
                return;
            }
        }

        self.turns.push(ChatTurn::new(sender, chunk));
        self.state = TurnState::OpenTurn(sender);
    }

    /// The user stopped speaking
    ///
    /// State always resets to [`TurnState::NoOpenTurn`].
    pub fn end_of_user_turn(&mut self) -> EndOfTurn {
        let state = std::mem::replace(&mut self.state, TurnState::NoOpenTurn);

        if state != TurnState::OpenTurn(MessageSender::Client) {
            return EndOfTurn::NoUserTurn;
        }
        if self.slot.current.is_some() {
            return EndOfTurn::Busy;
        }

        let Some((last, earlier)) = self.turns.split_last() else {
            return EndOfTurn::NoUserTurn;
        };

        let utterance = last.content.clone();
        let history = earlier.to_vec();
        let ticket = self.slot.occupy(self.cancel.child_token());
        EndOfTurn::Dispatch {
            utterance,
            history,
            ticket,
        }
    }

    /// Free the slot held by `ticket_id`
    ///
    /// Returns false for stale tickets, which are otherwise ignored.
    pub fn complete(&mut self, ticket_id: u64) -> bool {
        self.slot.release(ticket_id)
    }

    /// Cancel the in-flight reply, if any, and free the slot
    pub fn cancel_in_flight(&mut self) -> bool {
        self.slot.cancel()
    }

    /// Drop every turn, reset state and cancel the in-flight reply
    pub fn clear(&mut self) {
        self.turns.clear();
        self.state = TurnState::NoOpenTurn;
        self.cancel_in_flight();
    }

    #[must_use]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Whether a reply is in flight
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.slot.current.is_some()
    }
}
