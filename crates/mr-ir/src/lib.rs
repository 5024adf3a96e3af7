//! Core data model for the modrender tracker player.
//!
//! This crate defines the in-memory form of a 4-channel tracker module.
//! The parser in `mr-formats` produces a [`Module`], and the playback
//! engine in `mr-engine` borrows it for the lifetime of a song.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod effects;
mod module;
mod notes;
mod pattern;
mod sample;

pub use effects::Effect;
pub use module::{Module, Signature, HEADER_LEN, MAX_ORDERS, NUM_SAMPLES, PATTERN_BYTES};
pub use notes::{note_index, note_name, period_for_note, NOTE_PERIODS};
pub use pattern::{Cell, Pattern, CHANNELS, NO_NOTE, PERIOD_MAX, PERIOD_MIN, ROWS};
pub use sample::{SampleHeader, MAX_SAMPLE_LEN};
