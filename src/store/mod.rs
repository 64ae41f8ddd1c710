//! Relational session store. Every function takes the pool (or a transaction
//! connection) explicitly; there is no hidden global handle.

pub mod catalog;
pub mod characters;
pub mod chat;
pub mod notes;
pub mod npcs;
pub mod participants;

use uuid::Uuid;

/// Prefixed, time-ordered identifier such as `npc-0190...`.
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7())
}
