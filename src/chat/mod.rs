//! Chat turn aggregation
//!
//! Partial transcription chunks from the user and the avatar are stitched
//! into [`ChatTurn`]s. Each completed user turn triggers exactly one reply.

mod aggregator;
mod conversation;
mod turn;

pub use aggregator::{EndOfTurn, ReplyTicket, TurnAggregator, TurnState};
pub use conversation::{
    ConversationHandle, ConversationInput, ConversationLoop, ConversationSnapshot,
    INPUT_CHANNEL_CAPACITY,
};
pub use turn::{ChatTurn, MessageSender};
