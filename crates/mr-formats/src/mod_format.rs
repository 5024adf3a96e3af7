//! ProTracker MOD format parser.

use std::borrow::Cow;
use std::io::Cursor;

use binrw::BinRead;
use mr_ir::{
    Cell, Module, Pattern, SampleHeader, Signature, CHANNELS, HEADER_LEN, MAX_ORDERS,
    NUM_SAMPLES, PATTERN_BYTES, ROWS,
};

use crate::records::{RawHeader, RawSampleHeader};
use crate::FormatError;

/// Load a MOD file from bytes.
///
/// The returned module borrows its sample payload from `data`; nothing
/// past the pattern block is copied.
pub fn load_mod(data: &[u8]) -> Result<Module<'_>, FormatError> {
    let truncated = |needed: usize| FormatError::TruncatedFile {
        needed,
        len: data.len(),
    };

    if data.len() < HEADER_LEN {
        return Err(truncated(HEADER_LEN));
    }

    let header =
        RawHeader::read(&mut Cursor::new(&data[..HEADER_LEN])).map_err(|_| truncated(HEADER_LEN))?;

    // Detect format by checking signature at offset 1080
    let signature = Signature::from_bytes(&header.signature)
        .ok_or(FormatError::UnsupportedFormat(header.signature))?;
    log::debug!(
        "{} module, up to {} patterns",
        header.signature.escape_ascii(),
        signature.pattern_capacity()
    );

    // Mask order entries to the pattern capacity; the highest one decides
    // how many patterns are stored.
    let mask = (signature.pattern_capacity() - 1) as u8;
    let mut order = header.order;
    for entry in order.iter_mut() {
        *entry &= mask;
    }
    let pattern_count = order.iter().copied().max().unwrap_or(0) as usize + 1;

    let mut song_length = header.song_length;
    if song_length as usize > MAX_ORDERS {
        log::debug!("song length {} clamped to {}", song_length, MAX_ORDERS);
        song_length = MAX_ORDERS as u8;
    }

    let pcm_start = HEADER_LEN + pattern_count * PATTERN_BYTES;
    if data.len() < pcm_start {
        return Err(truncated(pcm_start));
    }

    let patterns = data[HEADER_LEN..pcm_start]
        .chunks_exact(PATTERN_BYTES)
        .map(parse_pattern)
        .collect();

    // Sample payloads follow the patterns back to back
    let mut samples = [SampleHeader::default(); NUM_SAMPLES];
    let mut offset = 0usize;
    for (i, (sample, raw)) in samples.iter_mut().zip(header.samples.iter()).enumerate() {
        *sample = parse_sample_header(raw, offset);
        offset += sample.length as usize;
        if pcm_start + offset > data.len() {
            return Err(truncated(pcm_start + offset));
        }
        if !sample.is_empty() {
            log::debug!(
                "sample {:2} {:22} len {:6} loop {}+{} vol {} ft {}",
                i + 1,
                sample.name().as_str(),
                sample.length,
                sample.loop_start,
                sample.loop_length,
                sample.volume,
                sample.finetune
            );
        }
    }

    Ok(Module {
        name: header.name,
        signature,
        samples,
        song_length,
        order,
        patterns,
        pcm: Cow::Borrowed(&data[pcm_start..pcm_start + offset]),
    })
}

/// Convert a 30-byte sample record to byte units.
fn parse_sample_header(raw: &RawSampleHeader, offset: usize) -> SampleHeader {
    SampleHeader {
        name: raw.name,
        length: raw.length as u32 * 2,
        finetune: raw.finetune & 0x0F,
        volume: raw.volume,
        loop_start: raw.loop_start as u32 * 2,
        loop_length: raw.loop_length as u32 * 2,
        offset,
    }
}

/// Parse a 1024-byte pattern block.
fn parse_pattern(data: &[u8]) -> Pattern {
    let mut pattern = Pattern::new();
    for (i, bytes) in data.chunks_exact(4).take(ROWS * CHANNELS).enumerate() {
        pattern.data[i] = Cell::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(tag: &[u8; 4]) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN];
        data[950] = 1;
        data[1080..1084].copy_from_slice(tag);
        data
    }

    #[test]
    fn rejects_unknown_signature() {
        let data = header_bytes(b"FLT8");
        assert_eq!(
            load_mod(&data).unwrap_err(),
            FormatError::UnsupportedFormat(*b"FLT8")
        );
    }

    #[test]
    fn rejects_short_header() {
        let data = vec![0u8; 600];
        assert_eq!(
            load_mod(&data).unwrap_err(),
            FormatError::TruncatedFile {
                needed: HEADER_LEN,
                len: 600
            }
        );
    }

    #[test]
    fn rejects_missing_pattern_block() {
        let data = header_bytes(b"M.K.");
        assert!(matches!(
            load_mod(&data),
            Err(FormatError::TruncatedFile { needed, .. }) if needed == HEADER_LEN + PATTERN_BYTES
        ));
    }

    #[test]
    fn order_entries_masked_to_capacity() {
        let mut data = header_bytes(b"M.K.");
        // 0x41 & 63 = 1, so two patterns are stored
        data[952] = 0x41;
        data.resize(HEADER_LEN + 2 * PATTERN_BYTES, 0);
        let module = load_mod(&data).unwrap();
        assert_eq!(module.order[0], 1);
        assert_eq!(module.patterns.len(), 2);
        assert_eq!(module.signature, Signature::ProTracker);
    }

    #[test]
    fn sample_lengths_are_word_counts() {
        let mut data = header_bytes(b"4CHN");
        // sample 1: 3 words, loop 1 word at word 1
        data[20 + 22..20 + 30].copy_from_slice(&[0, 3, 0x1F, 0x50, 0, 1, 0, 1]);
        data.resize(HEADER_LEN + PATTERN_BYTES, 0);
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6]);

        let module = load_mod(&data).unwrap();
        let sample = module.sample(1).unwrap();
        assert_eq!(sample.length, 6);
        assert_eq!(sample.finetune, 0x0F);
        assert_eq!(sample.default_volume(), 64);
        assert_eq!(sample.loop_start, 2);
        assert_eq!(sample.loop_length, 2);
        assert_eq!(module.sample_data(1), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn rejects_truncated_sample() {
        let mut data = header_bytes(b"M.K.");
        data[20 + 23] = 8;
        data.resize(HEADER_LEN + PATTERN_BYTES + 10, 0);
        assert_eq!(
            load_mod(&data).unwrap_err(),
            FormatError::TruncatedFile {
                needed: HEADER_LEN + PATTERN_BYTES + 16,
                len: HEADER_LEN + PATTERN_BYTES + 10
            }
        );
    }
}
