//! Playback-state synchronization for the embedded video player.
//!
//! This library provides:
//! - Validation of player messages (origin and payload)
//! - A player-agnostic event source with a vidsrc adapter
//! - Watch history, progress, and continue-watching derivation
//! - The saved-items vault

pub mod message;
pub mod source;
pub mod synchronizer;
pub mod vault;

pub use message::{InboundMessage, MessageError, OriginPolicy, PlayerMessage};
pub use source::{PlaybackEvent, PlaybackEventSource, VidsrcAdapter};
pub use synchronizer::{PlaybackState, PlaybackSynchronizer, ResumePoint};
pub use vault::Vault;
