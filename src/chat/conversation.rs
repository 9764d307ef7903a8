//! The conversation loop
//!
//! Sole owner of the [`TurnAggregator`]. Inputs are handled one at a time in
//! arrival order; reply generation runs on spawned tasks that report back
//! over an internal channel.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::aggregator::{EndOfTurn, TurnAggregator};
use super::turn::{ChatTurn, MessageSender};
use crate::avatar::AvatarEvent;
use crate::reply::{ReplyOrchestrator, ReplyOutcome};

/// Capacity of the inbound channel
pub const INPUT_CHANNEL_CAPACITY: usize = 64;

/// Something the conversation loop reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationInput {
    /// Event from the live avatar session
    Avatar(AvatarEvent),
    /// Typed user input, treated as a whole user turn
    Text(String),
    /// Drop the conversation so far
    Clear,
}

impl From<AvatarEvent> for ConversationInput {
    fn from(event: AvatarEvent) -> Self {
        Self::Avatar(event)
    }
}

/// Read-only view of the conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationSnapshot {
    pub turns: Vec<ChatTurn>,
    /// A reply is being generated or spoken
    pub processing: bool,
    /// Error of the most recent failed reply, cleared by the next spoken one
    pub last_reply_error: Option<String>,
}

struct Completion {
    ticket: u64,
    outcome: ReplyOutcome,
}

/// Handle to a running conversation loop
pub struct ConversationHandle {
    pub inputs: mpsc::Sender<ConversationInput>,
    pub snapshot: watch::Receiver<ConversationSnapshot>,
    pub task: JoinHandle<()>,
}

/// Event loop driving one conversation
pub struct ConversationLoop {
    aggregator: TurnAggregator,
    orchestrator: ReplyOrchestrator,
    inputs: mpsc::Receiver<ConversationInput>,
    snapshot: watch::Sender<ConversationSnapshot>,
    cancel: CancellationToken,
    last_reply_error: Option<String>,
}

impl ConversationLoop {
    #[must_use]
    pub fn new(
        orchestrator: ReplyOrchestrator,
        inputs: mpsc::Receiver<ConversationInput>,
        cancel: CancellationToken,
    ) -> (Self, watch::Receiver<ConversationSnapshot>) {
        let (snapshot, snapshot_rx) = watch::channel(ConversationSnapshot::default());
        let this = Self {
            aggregator: TurnAggregator::new(cancel.child_token()),
            orchestrator,
            inputs,
            snapshot,
            cancel,
            last_reply_error: None,
        };
        (this, snapshot_rx)
    }

    /// Start a loop on a background task
    #[must_use]
    pub fn spawn(orchestrator: ReplyOrchestrator, cancel: CancellationToken) -> ConversationHandle {
        let (inputs, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (this, snapshot) = Self::new(orchestrator, rx, cancel);
        let task = tokio::spawn(this.run());
        ConversationHandle {
            inputs,
            snapshot,
            task,
        }
    }

    /// Process inputs until cancelled or every sender is dropped
    ///
    /// Any in-flight reply is cancelled on exit.
    pub async fn run(mut self) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!("conversation loop cancelled");
                    break;
                }
                Some(done) = done_rx.recv() => self.on_completion(done),
                input = self.inputs.recv() => match input {
                    Some(input) => self.handle(input, &done_tx),
                    None => {
                        tracing::debug!("conversation inputs closed");
                        break;
                    }
                },
            }
            self.publish();
        }

        if self.aggregator.cancel_in_flight() {
            tracing::info!("in-flight reply cancelled");
        }
        self.publish();
    }

    fn handle(&mut self, input: ConversationInput, done: &mpsc::UnboundedSender<Completion>) {
        match input {
            ConversationInput::Avatar(event) => match event {
                AvatarEvent::UserTalkingMessage { message } => {
                    self.aggregator.push_chunk(MessageSender::Client, &message);
                }
                AvatarEvent::AvatarTalkingMessage { message } => {
                    self.aggregator.push_chunk(MessageSender::Avatar, &message);
                }
                AvatarEvent::UserEndMessage => self.end_of_user_turn(done),
                AvatarEvent::AvatarEndMessage => tracing::debug!("avatar finished speaking"),
                AvatarEvent::StreamReady => tracing::info!("avatar stream ready"),
                AvatarEvent::StreamDisconnected => tracing::info!("avatar stream disconnected"),
            },
            ConversationInput::Text(text) => {
                if text.trim().is_empty() {
                    tracing::debug!("ignoring blank text input");
                    return;
                }
                self.aggregator.push_chunk(MessageSender::Client, &text);
                self.end_of_user_turn(done);
            }
            ConversationInput::Clear => {
                self.aggregator.clear();
                self.last_reply_error = None;
                tracing::info!("conversation cleared");
            }
        }
    }

    fn end_of_user_turn(&mut self, done: &mpsc::UnboundedSender<Completion>) {
        match self.aggregator.end_of_user_turn() {
            EndOfTurn::Dispatch {
                utterance,
                history,
                ticket,
            } => {
                tracing::debug!(ticket = ticket.id(), "dispatching reply");
                let orchestrator = self.orchestrator.clone();
                let done = done.clone();
                tokio::spawn(async move {
                    let outcome = orchestrator
                        .generate_and_speak(&utterance, &history, ticket.cancel_token())
                        .await;
                    let _ = done.send(Completion {
                        ticket: ticket.id(),
                        outcome,
                    });
                });
            }
            EndOfTurn::Busy => tracing::debug!("reply in flight, end of turn ignored"),
            EndOfTurn::NoUserTurn => tracing::debug!("no open user turn"),
        }
    }

    fn on_completion(&mut self, done: Completion) {
        if !self.aggregator.complete(done.ticket) {
            tracing::debug!(ticket = done.ticket, "stale reply completion ignored");
            return;
        }

        match done.outcome {
            ReplyOutcome::Spoken { .. } => self.last_reply_error = None,
            ReplyOutcome::Failed(error) => self.last_reply_error = Some(error),
            ReplyOutcome::SkippedEmpty | ReplyOutcome::SkippedNoSession | ReplyOutcome::Cancelled => {}
        }
    }

    fn publish(&self) {
        let snapshot = ConversationSnapshot {
            turns: self.aggregator.turns().to_vec(),
            processing: self.aggregator.is_processing(),
            last_reply_error: self.last_reply_error.clone(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
