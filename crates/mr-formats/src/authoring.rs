//! Module creation and save-back for the editing path.

use std::borrow::Cow;
use std::io::Cursor;

use binrw::BinWrite;
use mr_ir::{
    Module, Pattern, SampleHeader, Signature, MAX_ORDERS, MAX_SAMPLE_LEN, NUM_SAMPLES,
    PATTERN_BYTES,
};

use crate::records::{RawHeader, RawSampleHeader};

/// Patterns allocated for a new module.
const BLANK_PATTERNS: usize = 128;

/// Create an empty module with an owned sample arena.
///
/// Every sample slot starts silent with full volume and the format's
/// "no loop" length of 2.
pub fn blank_module() -> Module<'static> {
    let sample = SampleHeader {
        volume: 64,
        loop_length: 2,
        ..Default::default()
    };
    Module {
        name: [0; 20],
        signature: Signature::ProTracker,
        samples: [sample; NUM_SAMPLES],
        song_length: 1,
        order: [0; MAX_ORDERS],
        patterns: vec![Pattern::new(); BLANK_PATTERNS],
        pcm: Cow::Owned(Vec::new()),
    }
}

/// Encode a module to MOD bytes.
///
/// The pattern count is recomputed from the order table. Modules using
/// more than 63 patterns are tagged `M!K!`, everything else `M.K.`.
pub fn save_mod(module: &Module<'_>) -> Vec<u8> {
    let pattern_count = module.pattern_count();
    let signature = if pattern_count > 63 {
        Signature::ProTracker128
    } else {
        Signature::ProTracker
    };

    let mut samples = [RawSampleHeader::default(); NUM_SAMPLES];
    for (raw, sample) in samples.iter_mut().zip(module.samples.iter()) {
        *raw = raw_sample_header(sample);
    }

    let header = RawHeader {
        name: module.name,
        samples,
        song_length: module.song_length,
        restart: 127,
        order: module.order,
        signature: *signature.tag(),
    };

    let pcm_len: usize = module.samples.iter().map(|s| s.length as usize).sum();
    let mut out = Cursor::new(Vec::with_capacity(
        mr_ir::HEADER_LEN + pattern_count * PATTERN_BYTES + pcm_len,
    ));
    // Writing into a Vec cannot fail
    let _ = header.write(&mut out);
    let mut out = out.into_inner();

    let empty = Pattern::new();
    for i in 0..pattern_count {
        let pattern = module.patterns.get(i).unwrap_or(&empty);
        for cell in &pattern.data {
            out.extend_from_slice(&cell.to_bytes());
        }
    }

    for (i, sample) in module.samples.iter().enumerate() {
        let len = sample.length.min(MAX_SAMPLE_LEN) as usize & !1;
        let data = module.sample_data(i as u8 + 1);
        let data = &data[..data.len().min(len)];
        out.extend_from_slice(data);
        out.resize(out.len() + (len - data.len()), 0);
    }

    out
}

fn raw_sample_header(sample: &SampleHeader) -> RawSampleHeader {
    RawSampleHeader {
        name: sample.name,
        length: (sample.length.min(MAX_SAMPLE_LEN) >> 1) as u16,
        finetune: sample.finetune & 0x0F,
        volume: sample.volume,
        loop_start: (sample.loop_start.min(MAX_SAMPLE_LEN) >> 1) as u16,
        loop_length: (sample.loop_length.min(MAX_SAMPLE_LEN) >> 1) as u16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_mod;
    use mr_ir::HEADER_LEN;

    #[test]
    fn blank_module_defaults() {
        let module = blank_module();
        assert_eq!(module.song_length, 1);
        assert_eq!(module.pattern_count(), 1);
        assert!(module.samples.iter().all(|s| s.volume == 64 && s.loop_length == 2));
        assert!(module.pcm.is_empty());
    }

    #[test]
    fn saved_blank_module_has_one_pattern() {
        let bytes = save_mod(&blank_module());
        assert_eq!(bytes.len(), HEADER_LEN + PATTERN_BYTES);
        assert_eq!(&bytes[1080..1084], b"M.K.");
        assert_eq!(bytes[951], 127);
    }

    #[test]
    fn many_patterns_use_wide_signature() {
        let mut module = blank_module();
        module.order[1] = 70;
        module.song_length = 2;
        let bytes = save_mod(&module);
        assert_eq!(&bytes[1080..1084], b"M!K!");
        assert_eq!(bytes.len(), HEADER_LEN + 71 * PATTERN_BYTES);

        let loaded = load_mod(&bytes).unwrap();
        assert_eq!(loaded.order[1], 70);
        assert_eq!(loaded.patterns.len(), 71);
    }

    #[test]
    fn sample_payload_written_in_slot_order() {
        let mut module = blank_module();
        module.set_sample_data(2, &[7, 8]);
        module.set_sample_data(1, &[1, 2, 3, 4]);
        let bytes = save_mod(&module);
        assert_eq!(&bytes[HEADER_LEN + PATTERN_BYTES..], &[1, 2, 3, 4, 7, 8]);
    }
}
