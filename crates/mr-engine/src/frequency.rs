//! Period-to-rate conversion for sample playback.
//!
//! Periods map to a source sample rate through a table built at compile
//! time, then a finetune multiplier scales the rate in 1.15 fixed point.

use mr_ir::{NOTE_PERIODS, PERIOD_MAX, PERIOD_MIN};

/// Entries in the rate table, one per period in `PERIOD_MIN..=PERIOD_MAX`.
pub const RATE_TABLE_LEN: usize = (PERIOD_MAX - PERIOD_MIN + 1) as usize;

/// Amiga PAL clock numerator used by the rate formula.
const PAL_CLOCK: u32 = 70_937_892;

/// Highest source rate produced for any period.
const RATE_CAP: u32 = 32_768;

/// Source sample rate (Hz) for each period starting at `PERIOD_MIN`.
pub static RATE_TABLE: [u16; RATE_TABLE_LEN] = build_rate_table();

/// Finetune multipliers in 1.15 fixed point for finetune nibbles 1..=15
/// (+1..+7 then -8..-1 eighth-semitones), rounded from 1.0072382087^n.
pub const FINETUNE_TABLE: [u16; 15] = [
    33005, 33244, 33485, 33727, 33971, 34217, 34465, // +1..+7
    30931, 31155, 31380, 31607, 31836, 32067, 32299, 32533, // -8..-1
];

const fn build_rate_table() -> [u16; RATE_TABLE_LEN] {
    let mut table = [0u16; RATE_TABLE_LEN];
    let mut i = 0;
    while i < RATE_TABLE_LEN {
        let rate = PAL_CLOCK / ((i as u32 + PERIOD_MIN as u32) * 20);
        table[i] = if rate > RATE_CAP { RATE_CAP as u16 } else { rate as u16 };
        i += 1;
    }
    table
}

/// Clamp a period to the valid MOD range.
pub fn clamp_period(period: u16) -> u16 {
    period.clamp(PERIOD_MIN, PERIOD_MAX)
}

/// Source sample rate for a period. Out-of-range periods are clamped.
pub fn period_rate(period: u16) -> u32 {
    RATE_TABLE[(clamp_period(period) - PERIOD_MIN) as usize] as u32
}

/// Source sample rate for a period with the sample's finetune applied.
pub fn finetuned_rate(period: u16, finetune: u8) -> u32 {
    let rate = period_rate(period);
    match finetune {
        0 => rate,
        1..=15 => (rate * FINETUNE_TABLE[finetune as usize - 1] as u32) >> 15,
        _ => {
            log::trace!("invalid finetune {}", finetune);
            rate
        }
    }
}

/// Period `steps` notes above `base` in the note table, saturating at
/// the table ends. Periods that are not exact notes are returned as is.
pub fn arpeggio_period(base: u16, steps: u8) -> u16 {
    match NOTE_PERIODS.iter().position(|&p| p == base) {
        Some(i) => NOTE_PERIODS[(i + steps as usize).min(NOTE_PERIODS.len() - 1)],
        None => base,
    }
}

/// Output samples per tick at a tempo: `sample_rate / max(1, bpm * 2 / 5)`.
pub fn samples_per_tick(sample_rate: u32, bpm: u8) -> u32 {
    let ticks_per_second = (bpm as u32 * 2 / 5).max(1);
    (sample_rate / ticks_per_second).max(1)
}
