//! Per-channel effect memory.

use mr_ir::{Effect, PERIOD_MAX, PERIOD_MIN};
use rand::Rng;

/// Half a sine period in 32 steps, scaled to 0-255.
const SINE_TABLE: [u8; 32] = [
    0, 24, 49, 74, 97, 120, 141, 161, 180, 197, 212, 224, 235, 244, 250, 253, //
    255, 253, 250, 244, 235, 224, 212, 197, 180, 161, 141, 120, 97, 74, 49, 24,
];

/// Waveform control bit that keeps the oscillator phase across rows.
pub const WAVE_CONTINUE: u8 = 0x04;

/// Effect state for one logical channel, carried from row to row.
///
/// The sequencer copies it, works on the copy and writes it back, so every
/// field is plain data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectState {
    /// Period currently sounding (before vibrato/arpeggio), 0 = none
    pub note: u16,
    /// Note written in the current row, 0 = none
    pub row_note: u16,
    /// Restart the sample when the row is applied
    pub reset_note: bool,
    /// 1-based sample number, 0 = none
    pub sample: u8,
    pub effect: Effect,
    /// Channel volume (0-64)
    pub volume: u8,
    /// Finetune index (0-15)
    pub finetune: u8,

    pub porta_target: u16,
    pub porta_speed: u8,
    /// Volume slide parameter remembered for `5xx`
    pub porta_volume: u8,
    pub arpeggio_memory: u8,

    pub vibrato_pos: u8,
    /// Vibrato parameter: speed in the high nibble, depth in the low
    pub vibrato_speed: u8,
    pub vibrato_wave: u8,
    /// Volume slide parameter remembered for `6xx`
    pub vibrato_volume: u8,
    /// Period produced by the last vibrato step, 0 = none
    pub last_vibrato: u16,

    pub tremolo_pos: u8,
    /// Tremolo parameter: speed in the high nibble, depth in the low
    pub tremolo_speed: u8,
    pub tremolo_wave: u8,
    /// Volume produced by the last tremolo step, 0 = none
    pub last_tremolo: u8,

    /// Tick a delayed note fires on
    pub delay_tick: u8,
    /// Remembered `9xx` offset in bytes
    pub sample_offset: u32,
    pub loop_count: u8,
    pub loop_row: u8,
    pub volume_slide: u8,
    /// Retrigger interval in ticks, 0 = off
    pub retrigger: u8,
}

impl EffectState {
    /// Step the period toward the portamento target. A channel with no
    /// sounding note stays put. Returns false when no target has been set.
    pub fn portamento(&mut self) -> bool {
        let target = self.porta_target;
        if target == 0 {
            return false;
        }
        if self.note == 0 {
            return true;
        }
        let speed = self.porta_speed as u16;
        if self.note < target {
            self.note = if target - self.note >= speed {
                self.note + speed
            } else {
                target
            };
        } else if self.note > target {
            self.note = if self.note - target >= speed {
                self.note - speed
            } else {
                target
            };
        }
        true
    }

    /// Advance the vibrato oscillator and store the modulated period.
    pub fn vibrato(&mut self, rng: &mut impl Rng) {
        if self.note == 0 {
            self.last_vibrato = 0;
            return;
        }
        self.vibrato_pos = self.vibrato_pos.wrapping_add(self.vibrato_speed >> 4);
        let level = wave_level(self.vibrato_wave, self.vibrato_pos, rng);
        let depth = (self.vibrato_speed & 0x0F) as i32;
        let period = ((level * depth) >> 7) + self.note as i32;
        self.last_vibrato = period.clamp(PERIOD_MIN as i32, PERIOD_MAX as i32) as u16;
    }

    /// Advance the tremolo oscillator and store the modulated volume.
    pub fn tremolo(&mut self, rng: &mut impl Rng) {
        self.tremolo_pos = self.tremolo_pos.wrapping_add(self.tremolo_speed >> 4);
        let level = wave_level(self.tremolo_wave, self.tremolo_pos, rng);
        let depth = (self.tremolo_speed & 0x0F) as i32;
        let volume = ((level * depth) >> 6) + self.volume as i32;
        self.last_tremolo = volume.clamp(0, 64) as u8;
    }

    /// Volume slide: the high nibble slides up, otherwise the low nibble
    /// slides down.
    pub fn slide_volume(&mut self, param: u8) {
        let up = param >> 4;
        let down = param & 0x0F;
        if up != 0 {
            self.volume = (self.volume + up).min(64);
        } else {
            self.volume = self.volume.saturating_sub(down);
        }
    }
}

/// Oscillator output for a waveform selector and phase.
///
/// The low two bits choose sine, ramp, square or random. Sine is signed by
/// bit 5 of the phase, the others are unipolar.
fn wave_level(wave: u8, pos: u8, rng: &mut impl Rng) -> i32 {
    let step = pos & 0x1F;
    match wave & 0x03 {
        0 => {
            let level = SINE_TABLE[step as usize] as i32;
            if pos & 0x20 != 0 {
                -level
            } else {
                level
            }
        }
        1 => (step as i32) << 3,
        2 => {
            if step > 15 {
                255
            } else {
                0
            }
        }
        _ => (rng.random::<u8>() & 0x7F) as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(1)
    }

    #[test]
    fn portamento_stops_on_target() {
        let mut fx = EffectState {
            note: 428,
            porta_target: 400,
            porta_speed: 16,
            ..Default::default()
        };
        assert!(fx.portamento());
        assert_eq!(fx.note, 412);
        assert!(fx.portamento());
        assert_eq!(fx.note, 400);
        assert!(fx.portamento());
        assert_eq!(fx.note, 400);
    }

    #[test]
    fn portamento_without_target() {
        let mut fx = EffectState {
            note: 428,
            porta_speed: 16,
            ..Default::default()
        };
        assert!(!fx.portamento());
        assert_eq!(fx.note, 428);
    }

    #[test]
    fn volume_slide_clamps_both_ways() {
        let mut fx = EffectState {
            volume: 60,
            ..Default::default()
        };
        for _ in 0..10 {
            fx.slide_volume(0xF0);
            assert!(fx.volume <= 64);
        }
        assert_eq!(fx.volume, 64);
        for _ in 0..10 {
            fx.slide_volume(0x0F);
        }
        assert_eq!(fx.volume, 0);
        // both nibbles set: up wins
        fx.slide_volume(0x32);
        assert_eq!(fx.volume, 3);
    }

    #[test]
    fn vibrato_stays_in_period_range() {
        let mut rng = rng();
        for wave in 0..4 {
            let mut fx = EffectState {
                note: PERIOD_MIN,
                vibrato_speed: 0xFF,
                vibrato_wave: wave,
                ..Default::default()
            };
            for _ in 0..128 {
                fx.vibrato(&mut rng);
                assert!((PERIOD_MIN..=PERIOD_MAX).contains(&fx.last_vibrato));
            }
        }
    }

    #[test]
    fn negative_vibrato_clamps_low() {
        let mut fx = EffectState {
            note: 120,
            // phase 0x20 + 8 lands on the negative half of the sine
            vibrato_pos: 0x20,
            vibrato_speed: 0x8F,
            ..Default::default()
        };
        fx.vibrato(&mut rng());
        assert_eq!(fx.last_vibrato, PERIOD_MIN);
    }

    #[test]
    fn tremolo_volume_stays_in_range() {
        let mut rng = rng();
        for volume in [0u8, 32, 64] {
            let mut fx = EffectState {
                volume,
                tremolo_speed: 0x4F,
                ..Default::default()
            };
            for _ in 0..64 {
                fx.tremolo(&mut rng);
                assert!(fx.last_tremolo <= 64);
            }
        }
    }

    #[test]
    fn square_wave_switches_halfway() {
        let mut rng = rng();
        assert_eq!(wave_level(2, 15, &mut rng), 0);
        assert_eq!(wave_level(2, 16, &mut rng), 255);
        assert_eq!(wave_level(1, 4, &mut rng), 32);
        assert_eq!(wave_level(0, 0x28, &mut rng), -180);
        assert!((0..128).contains(&wave_level(3, 0, &mut rng)));
    }
}
