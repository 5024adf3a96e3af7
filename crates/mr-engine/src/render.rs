//! Stereo render and output-format conversion.
//!
//! The player mixes into two stack accumulators in chunks, then converts
//! each chunk to the requested interleaved format.

use crate::frame::Frame;
use crate::player::Player;

/// Frames mixed per accumulator pass.
const CHUNK: usize = 256;

/// Own-side weight of the blended output, in percent.
const DIRECT: i32 = 70;
/// Cross-side weight of the blended output, in percent.
const CROSS: i32 = 30;

fn saturate(sample: i32) -> i16 {
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Blend each side with 30% of the other and halve, like the low-pass
/// crosstalk of the Amiga output stage.
fn blend(own: i32, other: i32) -> i16 {
    saturate(((own * DIRECT + other * CROSS) / 100) >> 1)
}

fn to_u8(sample: i32) -> u8 {
    ((sample >> 9) as u8).wrapping_add(128)
}

impl Player<'_> {
    /// Render interleaved stereo 16-bit samples with linear interpolation
    /// and the 70/30 cross-mix. A trailing odd sample is left untouched.
    pub fn render_s16(&mut self, out: &mut [i16]) {
        self.render_chunks::<true, i16>(out, |l, r, dst| {
            dst[0] = blend(l, r);
            dst[1] = blend(r, l);
        });
    }

    /// Render interleaved stereo 16-bit samples with nearest-sample
    /// stepping and no cross-mix.
    pub fn render_s16_fast(&mut self, out: &mut [i16]) {
        self.render_chunks::<false, i16>(out, |l, r, dst| {
            dst[0] = saturate(l);
            dst[1] = saturate(r);
        });
    }

    /// Render interleaved stereo unsigned 8-bit samples with
    /// nearest-sample stepping.
    pub fn render_u8(&mut self, out: &mut [u8]) {
        self.render_chunks::<false, u8>(out, |l, r, dst| {
            dst[0] = to_u8(l);
            dst[1] = to_u8(r);
        });
    }

    /// Render blended stereo frames.
    pub fn render_frames(&mut self, out: &mut [Frame]) {
        let mut left = [0i32; CHUNK];
        let mut right = [0i32; CHUNK];
        for frames in out.chunks_mut(CHUNK) {
            let n = frames.len();
            self.mix_checked::<true>(&mut left[..n], &mut right[..n]);
            for ((frame, &l), &r) in frames.iter_mut().zip(&left[..n]).zip(&right[..n]) {
                *frame = Frame::new(blend(l, r), blend(r, l));
            }
        }
    }

    fn render_chunks<const INTERPOLATE: bool, T>(
        &mut self,
        out: &mut [T],
        mut convert: impl FnMut(i32, i32, &mut [T]),
    ) {
        let mut left = [0i32; CHUNK];
        let mut right = [0i32; CHUNK];
        let frames = out.len() / 2;
        for dst in out[..frames * 2].chunks_mut(CHUNK * 2) {
            let n = dst.len() / 2;
            self.mix_checked::<INTERPOLATE>(&mut left[..n], &mut right[..n]);
            for (i, frame) in dst.chunks_exact_mut(2).enumerate() {
                convert(left[i], right[i], frame);
            }
        }
    }

    #[cfg(feature = "alloc_check")]
    fn mix_checked<const INTERPOLATE: bool>(&mut self, left: &mut [i32], right: &mut [i32]) {
        assert_no_alloc::assert_no_alloc(|| self.mix_block::<INTERPOLATE>(left, right));
    }

    #[cfg(not(feature = "alloc_check"))]
    fn mix_checked<const INTERPOLATE: bool>(&mut self, left: &mut [i32], right: &mut [i32]) {
        self.mix_block::<INTERPOLATE>(left, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerConfig;
    use alloc::borrow::Cow;
    use alloc::vec;
    use mr_ir::{Cell, Module, Pattern, SampleHeader, Signature, MAX_ORDERS, NUM_SAMPLES};

    /// One looping square sample played on `channel`.
    fn module(channel: usize) -> Module<'static> {
        let mut samples = [SampleHeader::default(); NUM_SAMPLES];
        samples[0] = SampleHeader {
            length: 64,
            volume: 64,
            loop_start: 0,
            loop_length: 64,
            ..Default::default()
        };
        let mut pattern = Pattern::new();
        *pattern.cell_mut(0, channel) = Cell {
            period: 428,
            sample: 1,
            effect: 0,
        };
        let pcm = (0..64).map(|i| if i < 32 { 0x60 } else { 0xA0 }).collect();
        Module {
            name: [0; 20],
            signature: Signature::ProTracker,
            samples,
            song_length: 1,
            order: [0; MAX_ORDERS],
            patterns: vec![pattern],
            pcm: Cow::Owned(pcm),
        }
    }

    #[test]
    fn blend_is_weighted_and_halved() {
        assert_eq!(blend(1000, 0), 350);
        assert_eq!(blend(0, 1000), 150);
        assert_eq!(blend(i32::MAX / 200, i32::MAX / 200), i16::MAX);
        assert_eq!(to_u8(0), 128);
        assert_eq!(to_u8(-512), 127);
        assert_eq!(to_u8(512), 129);
    }

    #[test]
    fn left_channel_pans_hard_left() {
        let module = module(0);
        let mut player = Player::new(&module, PlayerConfig::default());
        let mut out = vec![0i16; 1024];
        player.render_s16_fast(&mut out);
        assert!(out.iter().step_by(2).any(|&s| s != 0));
        assert!(out.iter().skip(1).step_by(2).all(|&s| s == 0));
    }

    #[test]
    fn blended_output_bleeds_across() {
        let module = module(1);
        let mut player = Player::new(&module, PlayerConfig::default());
        let mut out = vec![0i16; 1024];
        player.render_s16(&mut out);
        // the left side only carries the 30% cross-feed
        for pair in out.chunks_exact(2) {
            assert!(pair[1].unsigned_abs() >= pair[0].unsigned_abs());
        }
        assert!(out.chunks_exact(2).any(|p| p[0] != 0));
    }

    #[test]
    fn u8_silence_is_midpoint() {
        let module = module(2);
        let mut player = Player::new(&module, PlayerConfig::default());
        player.set_muted(2, true);
        let mut out = vec![0u8; 600];
        player.render_u8(&mut out);
        assert!(out.iter().all(|&b| b == 128));
    }

    #[test]
    fn frames_match_blended_samples() {
        let module = module(3);
        let mut a = Player::new(&module, PlayerConfig::default());
        let mut b = Player::new(&module, PlayerConfig::default());
        let mut samples = vec![0i16; 2 * 700];
        let mut frames = vec![Frame::default(); 700];
        a.render_s16(&mut samples);
        b.render_frames(&mut frames);
        for (frame, pair) in frames.iter().zip(samples.chunks_exact(2)) {
            assert_eq!((frame.left, frame.right), (pair[0], pair[1]));
        }
    }

    #[test]
    fn odd_trailing_sample_is_untouched() {
        let module = module(0);
        let mut player = Player::new(&module, PlayerConfig::default());
        let mut out = vec![7i16; 5];
        player.render_s16(&mut out);
        assert_eq!(out[4], 7);
    }
}
