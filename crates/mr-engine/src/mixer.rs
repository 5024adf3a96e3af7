//! Fixed-point resampling mixer channel.
//!
//! Each channel converts a pulled 8-bit source at an arbitrary rate to the
//! output rate with 16.16 stepping and linear interpolation, and adds the
//! result into a caller-owned accumulator.

/// Samples per refill window.
pub const RING_LEN: usize = 256;

/// Scale applied to 8-bit PCM on refill, leaving headroom for interpolation.
const PCM_SCALE: i32 = 0x80_0000;

/// One whole source sample in 16.16 fixed point.
const ONE: u32 = 0x1_0000;

/// Outcome of a refill request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pull {
    /// The window is filled and more data follows.
    Ready,
    /// The source ran out. The window is zero padded and the channel
    /// should stop stepping.
    Exhausted,
}

/// Supplies 256-byte windows of signed 8-bit PCM to a mixer channel.
///
/// Called from the render path: implementations must not block or allocate.
pub trait SampleSource {
    fn pull(&mut self, channel: usize, window: &mut [u8; RING_LEN]) -> Pull;
}

/// A single resampling channel.
#[derive(Clone, Debug)]
pub struct MixerChannel<S> {
    id: usize,
    target_rate: u32,
    /// Source-to-target ratio in 16.16 fixed point; 0 silences the channel
    step: u32,
    /// Sub-sample position in 16 fractional bits
    frac: u32,
    /// Next ring slot to load; `RING_LEN` means a refill is pending
    cursor: usize,
    prev: i32,
    cur: i32,
    ring: [i32; RING_LEN],
    volume: u8,
    muted: bool,
    /// One-pole low-pass coefficient, tracked on rate changes but not applied
    filter_coefficient: i32,
    source: Option<S>,
}

impl<S: SampleSource> MixerChannel<S> {
    /// Create a pass-through channel mixing at `target_rate`.
    pub fn new(id: usize, target_rate: u32) -> Self {
        Self {
            id,
            target_rate: target_rate.max(1),
            step: ONE,
            frac: ONE,
            cursor: RING_LEN,
            prev: 0,
            cur: 0,
            ring: [0; RING_LEN],
            volume: 0,
            muted: false,
            filter_coefficient: 0,
            source: None,
        }
    }

    /// Install the refill source. Without one the channel produces nothing.
    pub fn set_source(&mut self, source: S) {
        self.source = Some(source);
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> Option<&mut S> {
        self.source.as_mut()
    }

    /// Set the source sample rate in Hz. A rate of 0 stops the channel.
    pub fn set_rate(&mut self, rate: u32) {
        if rate == 0 {
            self.step = 0;
            self.prev = 0;
            self.cur = 0;
            self.filter_coefficient = 0;
            return;
        }
        self.step = ((rate as u64 * ONE as u64) / self.target_rate as u64) as u32;
        let bandwidth = rate.min(self.target_rate) as i64;
        self.filter_coefficient =
            ((bandwidth * 0x3ED4_F4C0 / self.target_rate as i64 / 2) >> 16) as i32;
    }

    /// Set the volume, clamped to 0-64.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(64);
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn filter_coefficient(&self) -> i32 {
        self.filter_coefficient
    }

    /// A muted channel keeps stepping through its source but adds nothing.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Discard the current window so the next step pulls fresh data.
    pub fn flush(&mut self) {
        self.cursor = RING_LEN;
    }

    /// Add the interpolated channel output into `out`.
    pub fn mix(&mut self, out: &mut [i32]) {
        self.add::<true>(out);
    }

    /// Add the nearest-sample channel output into `out`.
    pub fn mix_nearest(&mut self, out: &mut [i32]) {
        self.add::<false>(out);
    }

    fn add<const INTERPOLATE: bool>(&mut self, out: &mut [i32]) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if self.step == 0 {
            self.prev = 0;
            self.cur = 0;
            return;
        }

        // A source running dry zeroes `self.step`, but this call keeps
        // stepping through the zero-padded window.
        let step = self.step;
        let volume = self.volume as i32;

        for acc in out.iter_mut() {
            if !self.muted {
                let value = if INTERPOLATE {
                    let delta = (self.cur - self.prev) >> 20;
                    (self.prev >> 15) + ((delta * self.frac as i32) >> 11)
                } else {
                    self.prev >> 15
                };
                *acc += (value * volume) >> 6;
            }

            self.frac += step;
            if self.frac >= ONE {
                self.cursor += (self.frac >> 16) as usize;
                self.frac &= 0xFFFF;
                if self.cursor >= RING_LEN {
                    self.cursor &= RING_LEN - 1;
                    let mut window = [0u8; RING_LEN];
                    if source.pull(self.id, &mut window) == Pull::Exhausted {
                        self.step = 0;
                    }
                    for (slot, &byte) in self.ring.iter_mut().zip(window.iter()) {
                        *slot = byte as i8 as i32 * PCM_SCALE;
                    }
                }
                self.prev = self.cur;
                self.cur = self.ring[self.cursor];
            }
        }
    }
}
