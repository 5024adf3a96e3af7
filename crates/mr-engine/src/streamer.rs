//! Sample streaming with loop handling.

use mr_ir::Module;

use crate::mixer::{Pull, SampleSource, RING_LEN};

/// Streams a module sample into mixer refill windows.
///
/// The first pass after a trigger runs to the end of the sample, later
/// passes cycle through the loop region. Samples without a usable loop
/// stop after one pass.
#[derive(Clone, Debug)]
pub struct SampleStreamer<'m> {
    module: &'m Module<'m>,
    /// 1-based sample number, 0 = none
    sample: u8,
    active: bool,
    first_pass: bool,
    /// Byte offset of the next read
    pos: u32,
}

impl<'m> SampleStreamer<'m> {
    pub fn new(module: &'m Module<'m>) -> Self {
        Self {
            module,
            sample: 0,
            active: false,
            first_pass: false,
            pos: 0,
        }
    }

    /// Start playing `sample` from byte offset `start`.
    pub fn trigger(&mut self, sample: u8, start: u32) {
        self.sample = sample;
        self.active = sample != 0;
        self.first_pass = true;
        self.pos = start;
    }

    /// Move the read position without restarting the pass.
    pub fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    pub fn sample(&self) -> u8 {
        self.sample
    }

    pub fn position(&self) -> u32 {
        self.pos
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl SampleSource for SampleStreamer<'_> {
    fn pull(&mut self, _channel: usize, window: &mut [u8; RING_LEN]) -> Pull {
        let header = match self.module.sample(self.sample) {
            Some(header) if self.active => header,
            _ => {
                window.fill(0);
                return Pull::Ready;
            }
        };
        let data = self.module.sample_data(self.sample);

        let (loop_start, loop_length) = header.loop_region();
        let loop_start = loop_start as usize;
        let loop_end = (loop_start + loop_length as usize).min(data.len());
        let looping = header.has_loop() && loop_end > loop_start + 2;

        let mut filled = 0;
        let mut pos = self.pos as usize;
        loop {
            let wrap = if self.first_pass { data.len() } else { loop_end };
            if pos < wrap {
                let len = (wrap - pos).min(RING_LEN - filled);
                window[filled..filled + len].copy_from_slice(&data[pos..pos + len]);
                filled += len;
                pos += len;
            }
            if pos < wrap {
                break;
            }

            if !looping {
                self.active = false;
                self.pos = 2;
                window[filled..].fill(0);
                return Pull::Exhausted;
            }
            pos = loop_start;
            self.first_pass = false;
            if filled == RING_LEN {
                break;
            }
        }

        self.pos = pos as u32;
        Pull::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::borrow::Cow;
    use alloc::vec;
    use alloc::vec::Vec;
    use mr_ir::{Pattern, SampleHeader, Signature, MAX_ORDERS, NUM_SAMPLES};

    fn module(pcm: Vec<u8>, loop_start: u32, loop_length: u32) -> Module<'static> {
        let mut samples = [SampleHeader::default(); NUM_SAMPLES];
        samples[0] = SampleHeader {
            length: pcm.len() as u32,
            volume: 64,
            loop_start,
            loop_length,
            ..Default::default()
        };
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
    fn no_sample_streams_silence() {
        let module = module(vec![9; 16], 0, 0);
        let mut streamer = SampleStreamer::new(&module);
        let mut window = [0xAAu8; RING_LEN];
        assert_eq!(streamer.pull(0, &mut window), Pull::Ready);
        assert!(window.iter().all(|&b| b == 0));
    }

    #[test]
    fn one_shot_plays_length_bytes_then_stops() {
        let module = module(vec![5; 300], 0, 0);
        let mut streamer = SampleStreamer::new(&module);
        streamer.trigger(1, 0);

        let mut window = [0u8; RING_LEN];
        assert_eq!(streamer.pull(0, &mut window), Pull::Ready);
        assert!(window.iter().all(|&b| b == 5));

        assert_eq!(streamer.pull(0, &mut window), Pull::Exhausted);
        assert!(window[..44].iter().all(|&b| b == 5));
        assert!(window[44..].iter().all(|&b| b == 0));
        assert!(!streamer.is_active());

        assert_eq!(streamer.pull(0, &mut window), Pull::Ready);
        assert!(window.iter().all(|&b| b == 0));
    }

    #[test]
    fn two_byte_loop_counts_as_one_shot() {
        let module = module(vec![1; 10], 4, 2);
        let mut streamer = SampleStreamer::new(&module);
        streamer.trigger(1, 0);
        let mut window = [0u8; RING_LEN];
        assert_eq!(streamer.pull(0, &mut window), Pull::Exhausted);
        assert_eq!(window.iter().filter(|&&b| b == 1).count(), 10);
    }

    #[test]
    fn short_loop_wraps_many_times_per_window() {
        let pcm: Vec<u8> = (0..8).collect();
        let module = module(pcm, 4, 4);
        let mut streamer = SampleStreamer::new(&module);
        streamer.trigger(1, 0);

        let mut window = [0u8; RING_LEN];
        assert_eq!(streamer.pull(0, &mut window), Pull::Ready);
        assert_eq!(&window[..12], &[0, 1, 2, 3, 4, 5, 6, 7, 4, 5, 6, 7]);
        assert!(window[8..].chunks(4).all(|c| c == [4, 5, 6, 7]));
        assert_eq!(streamer.position(), 4);
    }

    #[test]
    fn overlong_loop_wraps_at_sample_end() {
        let pcm: Vec<u8> = (0..8).collect();
        let module = module(pcm, 4, 40);
        let mut streamer = SampleStreamer::new(&module);
        streamer.trigger(1, 0);

        let mut window = [0u8; RING_LEN];
        assert_eq!(streamer.pull(0, &mut window), Pull::Ready);
        assert_eq!(&window[..16], &[0, 1, 2, 3, 4, 5, 6, 7, 4, 5, 6, 7, 4, 5, 6, 7]);
        assert_eq!(module.samples[0].loop_length, 40);
    }

    #[test]
    fn start_offset_past_end_stops_cleanly() {
        let module = module(vec![3; 64], 0, 0);
        let mut streamer = SampleStreamer::new(&module);
        streamer.trigger(1, 0x100);
        let mut window = [0xFFu8; RING_LEN];
        assert_eq!(streamer.pull(0, &mut window), Pull::Exhausted);
        assert!(window.iter().all(|&b| b == 0));
    }
}
