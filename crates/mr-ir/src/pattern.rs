//! Pattern and cell types for tracker sequences.

use alloc::vec::Vec;

use crate::effects::Effect;

/// Rows in every pattern.
pub const ROWS: usize = 64;

/// Logical tracker channels.
pub const CHANNELS: usize = 4;

/// Lowest playable period (highest pitch, B-3).
pub const PERIOD_MIN: u16 = 113;

/// Highest playable period (lowest pitch, C-1).
pub const PERIOD_MAX: u16 = 856;

/// Period value some editors write for "no note".
pub const NO_NOTE: u16 = 0xFFF;

/// A single cell in a pattern, stored exactly as encoded on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// Amiga period (12 bits, 0 = no note)
    pub period: u16,
    /// Sample number (0 = keep current, 1-31 otherwise)
    pub sample: u8,
    /// 12-bit effect code: command nibble plus parameter byte
    pub effect: u16,
}

impl Cell {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            period: 0,
            sample: 0,
            effect: 0,
        }
    }

    /// Decode a cell from its 4-byte on-disk form.
    ///
    /// Byte 0: upper 4 bits of sample number, upper 4 bits of period
    /// Byte 1: lower 8 bits of period
    /// Byte 2: lower 4 bits of sample number, effect command
    /// Byte 3: effect parameter
    pub fn from_bytes(data: [u8; 4]) -> Self {
        Self {
            period: (((data[0] & 0x0F) as u16) << 8) | data[1] as u16,
            sample: (data[0] & 0xF0) | (data[2] >> 4),
            effect: (((data[2] & 0x0F) as u16) << 8) | data[3] as u16,
        }
    }

    /// Encode the cell back into its 4-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            (self.sample & 0xF0) | ((self.period >> 8) as u8 & 0x0F),
            self.period as u8,
            ((self.sample & 0x0F) << 4) | ((self.effect >> 8) as u8 & 0x0F),
            self.effect as u8,
        ]
    }

    /// The note period clamped to the playable range, or `None` when the
    /// cell carries no note.
    pub fn note(&self) -> Option<u16> {
        match self.period {
            0 | NO_NOTE => None,
            p => Some(p.clamp(PERIOD_MIN, PERIOD_MAX)),
        }
    }

    /// The decoded effect command.
    pub fn effect(&self) -> Effect {
        Effect::decode(self.effect)
    }

    /// Returns true if the cell is completely empty.
    pub fn is_empty(&self) -> bool {
        self.period == 0 && self.sample == 0 && self.effect == 0
    }
}

/// A 64-row pattern of 4 channel cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// Pattern data, stored row-major: data[row * CHANNELS + channel]
    pub data: Vec<Cell>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Pattern {
    /// Create a new pattern with empty cells.
    pub fn new() -> Self {
        Self {
            data: alloc::vec![Cell::empty(); ROWS * CHANNELS],
        }
    }

    /// Get a reference to a cell.
    pub fn cell(&self, row: usize, channel: usize) -> &Cell {
        debug_assert!(row < ROWS);
        debug_assert!(channel < CHANNELS);
        &self.data[row * CHANNELS + channel]
    }

    /// Get a mutable reference to a cell.
    pub fn cell_mut(&mut self, row: usize, channel: usize) -> &mut Cell {
        debug_assert!(row < ROWS);
        debug_assert!(channel < CHANNELS);
        &mut self.data[row * CHANNELS + channel]
    }

    /// All cells in a row.
    pub fn row(&self, row: usize) -> &[Cell] {
        let start = row * CHANNELS;
        &self.data[start..start + CHANNELS]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_decodes_split_sample_number() {
        // sample 0x1F: high nibble in byte 0, low nibble in byte 2
        let cell = Cell::from_bytes([0x11, 0xAC, 0xFC, 0x40]);
        assert_eq!(cell.sample, 0x1F);
        assert_eq!(cell.period, 0x1AC);
        assert_eq!(cell.effect, 0xC40);
    }

    #[test]
    fn cell_bytes_survive_encode() {
        let raw = [0x10, 0xD6, 0x3E, 0x91];
        assert_eq!(Cell::from_bytes(raw).to_bytes(), raw);
    }

    #[test]
    fn note_is_clamped_and_sentinel_aware() {
        let mut cell = Cell::empty();
        assert_eq!(cell.note(), None);
        cell.period = NO_NOTE;
        assert_eq!(cell.note(), None);
        cell.period = 50;
        assert_eq!(cell.note(), Some(PERIOD_MIN));
        cell.period = 1000;
        assert_eq!(cell.note(), Some(PERIOD_MAX));
        cell.period = 428;
        assert_eq!(cell.note(), Some(428));
    }

    #[test]
    fn pattern_cell_access() {
        let mut pattern = Pattern::new();
        pattern.cell_mut(10, 2).period = 428;

        assert_eq!(pattern.cell(10, 2).period, 428);
        assert_eq!(pattern.cell(10, 1).period, 0);
        assert_eq!(pattern.row(10)[2].period, 428);
    }
}
