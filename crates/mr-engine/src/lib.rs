//! Playback engine for the modrender tracker player.
//!
//! A [`Player`] borrows a parsed module and drives four resampling mixer
//! channels from the pattern sequence, rendering interleaved PCM on demand.
//! The render path never allocates or blocks.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod effect_state;
mod frame;
pub mod frequency;
pub mod mixer;
mod player;
mod render;
mod streamer;

pub use effect_state::EffectState;
pub use frame::Frame;
pub use mixer::{MixerChannel, Pull, SampleSource, RING_LEN};
pub use player::{Player, PlayerConfig, Position, RowHook, WrapHook};
pub use streamer::SampleStreamer;
