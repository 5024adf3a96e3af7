//! Sample descriptor types.

use arrayvec::ArrayString;

/// Largest sample length expressible by the 16-bit word count in a header.
pub const MAX_SAMPLE_LEN: u32 = 0x1FFFE;

/// A sample slot as described by the module header.
///
/// Lengths and loop points are in bytes (the file stores them as 16-bit
/// word counts). The PCM itself lives in the module's payload at `offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleHeader {
    /// Raw name bytes (zero padded)
    pub name: [u8; 22],
    /// Length of the PCM payload in bytes
    pub length: u32,
    /// Finetune index (0-15; 8-15 tune downward)
    pub finetune: u8,
    /// Volume byte as stored in the file
    pub volume: u8,
    /// Loop start offset in bytes
    pub loop_start: u32,
    /// Loop length in bytes (0 or 2 means "play once")
    pub loop_length: u32,
    /// Byte offset of this sample's PCM inside the module payload
    pub offset: usize,
}

impl Default for SampleHeader {
    fn default() -> Self {
        Self {
            name: [0; 22],
            length: 0,
            finetune: 0,
            volume: 0,
            loop_start: 0,
            loop_length: 0,
            offset: 0,
        }
    }
}

impl SampleHeader {
    /// Sample name up to the first NUL, with non-UTF-8 bytes replaced by `?`.
    pub fn name(&self) -> ArrayString<22> {
        let mut name = ArrayString::new();
        for &b in self.name.iter().take_while(|&&b| b != 0) {
            let c = if b.is_ascii() && !b.is_ascii_control() {
                b as char
            } else {
                '?'
            };
            name.push(c);
        }
        name
    }

    /// Set the name, truncating to 22 bytes.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; 22];
        for (dst, src) in self.name.iter_mut().zip(name.bytes()) {
            *dst = src;
        }
    }

    /// Volume the sample starts at when triggered (0-64).
    pub fn default_volume(&self) -> u8 {
        self.volume.min(64)
    }

    /// Returns true if the sample has PCM data.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns true if the sample keeps playing its loop region after the
    /// first pass. Regions of 2 bytes or less are the format's "no loop".
    pub fn has_loop(&self) -> bool {
        self.loop_length > 2
    }

    /// Loop region as `(start, length)` pulled inside the sample, so that
    /// `start + length <= length` of the sample holds. The stored fields
    /// keep whatever the file said.
    pub fn loop_region(&self) -> (u32, u32) {
        let start = self.loop_start.min(self.length);
        let length = self.loop_length.min(self.length - start);
        (start, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_stops_at_nul() {
        let mut header = SampleHeader::default();
        header.set_name("kick");
        assert_eq!(header.name().as_str(), "kick");
    }

    #[test]
    fn default_volume_is_capped() {
        let header = SampleHeader {
            volume: 0x50,
            ..Default::default()
        };
        assert_eq!(header.default_volume(), 64);
    }

    #[test]
    fn loop_region_stays_inside_sample() {
        let mut header = SampleHeader {
            length: 100,
            loop_start: 80,
            loop_length: 60,
            ..Default::default()
        };
        assert_eq!(header.loop_region(), (80, 20));
        assert_eq!((header.loop_start, header.loop_length), (80, 60));

        header.loop_start = 200;
        assert_eq!(header.loop_region(), (100, 0));

        header.loop_start = 10;
        header.loop_length = 2;
        assert_eq!(header.loop_region(), (10, 2));
    }

    #[test]
    fn short_loops_do_not_repeat() {
        let mut header = SampleHeader {
            length: 64,
            loop_length: 2,
            ..Default::default()
        };
        assert!(!header.has_loop());
        header.loop_length = 4;
        assert!(header.has_loop());
    }
}
