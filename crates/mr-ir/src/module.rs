//! Module container: song metadata, sample table, patterns and PCM payload.

use alloc::borrow::Cow;
use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::pattern::{Cell, Pattern, CHANNELS, ROWS};
use crate::sample::SampleHeader;

/// Size of the fixed header up to and including the signature.
pub const HEADER_LEN: usize = 1084;

/// Bytes in one encoded pattern (64 rows x 4 channels x 4 bytes).
pub const PATTERN_BYTES: usize = ROWS * CHANNELS * 4;

/// Length of the pattern order table.
pub const MAX_ORDERS: usize = 128;

/// Sample slots in a 31-sample module.
pub const NUM_SAMPLES: usize = 31;

/// Format signature found at offset 1080.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature {
    /// `M.K.`: up to 64 patterns
    ProTracker,
    /// `M!K!`: up to 128 patterns
    ProTracker128,
    /// `4CHN`: handled like `M!K!`
    FourChannel,
}

impl Signature {
    /// Identify a signature tag, or `None` if unsupported.
    pub fn from_bytes(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"M.K." => Some(Signature::ProTracker),
            b"M!K!" => Some(Signature::ProTracker128),
            b"4CHN" => Some(Signature::FourChannel),
            _ => None,
        }
    }

    /// The 4-byte tag as written to disk.
    pub fn tag(&self) -> &'static [u8; 4] {
        match self {
            Signature::ProTracker => b"M.K.",
            Signature::ProTracker128 => b"M!K!",
            Signature::FourChannel => b"4CHN",
        }
    }

    /// Number of patterns the order table may address.
    pub fn pattern_capacity(&self) -> usize {
        match self {
            Signature::ProTracker => 64,
            Signature::ProTracker128 | Signature::FourChannel => 128,
        }
    }
}

/// A parsed 4-channel module.
///
/// The PCM payload is borrowed from the caller's buffer when loaded for
/// playback, and owned when created or edited through the authoring path.
#[derive(Clone, Debug)]
pub struct Module<'a> {
    /// Raw title bytes (zero padded)
    pub name: [u8; 20],
    pub signature: Signature,
    pub samples: [SampleHeader; NUM_SAMPLES],
    /// Number of order entries that are played
    pub song_length: u8,
    /// Pattern order table, entries masked to the signature's capacity
    pub order: [u8; MAX_ORDERS],
    pub patterns: Vec<Pattern>,
    /// Concatenated 8-bit signed PCM, addressed by `SampleHeader::offset`
    pub pcm: Cow<'a, [u8]>,
}

impl<'a> Module<'a> {
    /// Module title up to the first NUL.
    pub fn name(&self) -> ArrayString<20> {
        let mut name = ArrayString::new();
        for &b in self.name.iter().take_while(|&&b| b != 0) {
            name.push(if b.is_ascii() && !b.is_ascii_control() {
                b as char
            } else {
                '?'
            });
        }
        name
    }

    /// Set the title, truncating to 20 bytes.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; 20];
        for (dst, src) in self.name.iter_mut().zip(name.bytes()) {
            *dst = src;
        }
    }

    /// Look up a sample by its 1-based number.
    pub fn sample(&self, number: u8) -> Option<&SampleHeader> {
        match number {
            0 => None,
            n => self.samples.get(n as usize - 1),
        }
    }

    /// PCM bytes for a 1-based sample number. Empty when the sample has
    /// no data or its range falls outside the payload.
    pub fn sample_data(&self, number: u8) -> &[u8] {
        self.sample(number)
            .and_then(|s| self.pcm.get(s.offset..s.offset + s.length as usize))
            .unwrap_or(&[])
    }

    /// Number of patterns addressed by the order table (highest used entry + 1).
    pub fn pattern_count(&self) -> usize {
        self.order.iter().copied().max().unwrap_or(0) as usize + 1
    }

    /// Pattern index played at an order position.
    pub fn pattern_at(&self, order: usize) -> usize {
        self.order.get(order).copied().unwrap_or(0) as usize
    }

    /// Cell at (order position, row, channel), or an empty cell if the
    /// order entry points past the loaded patterns.
    pub fn cell_at(&self, order: usize, row: usize, channel: usize) -> Cell {
        self.patterns
            .get(self.pattern_at(order))
            .map(|p| *p.cell(row, channel))
            .unwrap_or_default()
    }

    /// Replace a sample's PCM. Rebuilds the payload as an owned arena so
    /// every sample stays contiguous and offsets remain valid.
    pub fn set_sample_data(&mut self, number: u8, data: &[u8]) {
        if number == 0 || number as usize > NUM_SAMPLES {
            return;
        }
        let target = number as usize - 1;
        let data = &data[..data.len().min(crate::sample::MAX_SAMPLE_LEN as usize) & !1];

        let mut arena = Vec::with_capacity(self.pcm.len() + data.len());
        for (i, header) in self.samples.iter_mut().enumerate() {
            let bytes: &[u8] = if i == target {
                data
            } else {
                self.pcm
                    .get(header.offset..header.offset + header.length as usize)
                    .unwrap_or(&[])
            };
            header.offset = arena.len();
            header.length = bytes.len() as u32;
            arena.extend_from_slice(bytes);
        }
        self.pcm = Cow::Owned(arena);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn module_with_pcm(pcm: Vec<u8>) -> Module<'static> {
        let mut samples = [SampleHeader::default(); NUM_SAMPLES];
        samples[0].length = 4;
        samples[1].length = 2;
        samples[1].offset = 4;
        Module {
            name: [0; 20],
            signature: Signature::ProTracker,
            samples,
            song_length: 1,
            order: [0; MAX_ORDERS],
            patterns: vec![Pattern::new()],
            pcm: Cow::Owned(pcm),
        }
    }

    #[test]
    fn signature_capacity() {
        assert_eq!(Signature::from_bytes(b"M.K.").map(|s| s.pattern_capacity()), Some(64));
        assert_eq!(Signature::from_bytes(b"M!K!").map(|s| s.pattern_capacity()), Some(128));
        assert_eq!(Signature::from_bytes(b"4CHN").map(|s| s.pattern_capacity()), Some(128));
        assert_eq!(Signature::from_bytes(b"8CHN"), None);
    }

    #[test]
    fn sample_lookup_is_one_based() {
        let module = module_with_pcm(vec![1, 2, 3, 4, 5, 6]);
        assert!(module.sample(0).is_none());
        assert_eq!(module.sample_data(1), &[1, 2, 3, 4]);
        assert_eq!(module.sample_data(2), &[5, 6]);
        assert!(module.sample_data(3).is_empty());
        assert!(module.sample_data(32).is_empty());
    }

    #[test]
    fn replacing_sample_data_keeps_neighbours() {
        let mut module = module_with_pcm(vec![1, 2, 3, 4, 5, 6]);
        module.set_sample_data(1, &[9, 9]);
        assert_eq!(module.sample_data(1), &[9, 9]);
        assert_eq!(module.sample_data(2), &[5, 6]);
        assert_eq!(module.samples[1].offset, 2);
    }

    #[test]
    fn missing_pattern_reads_as_empty() {
        let mut module = module_with_pcm(Vec::new());
        module.order[0] = 5;
        assert_eq!(module.pattern_count(), 6);
        assert!(module.cell_at(0, 0, 0).is_empty());
    }
}
