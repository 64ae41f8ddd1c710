//! Live session core: who is connected, what they may see, and the
//! per-connection message loop.

pub mod broadcast;
pub mod dice;
pub mod protocol;
pub mod registry;
pub mod ws;
