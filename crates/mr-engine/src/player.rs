//! Pattern sequencer and tick driver.

use alloc::boxed::Box;
use mr_ir::{Effect, Module, CHANNELS, ROWS};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::effect_state::{EffectState, WAVE_CONTINUE};
use crate::frequency::{arpeggio_period, clamp_period, finetuned_rate, samples_per_tick};
use crate::mixer::MixerChannel;
use crate::streamer::SampleStreamer;

const DEFAULT_BPM: u8 = 125;
const DEFAULT_SPEED: u8 = 6;

/// Byte offset a triggered sample starts from (skips the loop-marker word).
const NOTE_START: u32 = 2;

/// Seed for the random vibrato/tremolo waveform, fixed so renders repeat.
const RNG_SEED: u64 = 0x6d6f_6472;

/// Playback settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Restart from the first order instead of ending
    pub repeat: bool,
    /// Keep cycling the current pattern (tracker mode)
    pub pattern_repeat: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            repeat: false,
            pattern_repeat: false,
        }
    }
}

/// Current playback position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    /// Index into the order table
    pub order: u8,
    /// Pattern number at that order
    pub pattern: u8,
    pub row: u8,
    pub tick: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlayState {
    Playing,
    /// The song ran out. Renders produce silence until `reset`.
    Ended,
}

/// Row-change notification. Runs on the render path.
pub type RowHook<'m> = Box<dyn FnMut(Position) + Send + 'm>;

/// Called when repeat playback wraps back to an earlier order.
pub type WrapHook<'m> = Box<dyn FnMut() + Send + 'm>;

#[derive(Clone, Copy, Debug)]
struct PlaybackCursor {
    order: usize,
    next_order: usize,
    row: usize,
    next_row: usize,
    bpm: u8,
    speed: u8,
    samples_per_tick: u32,
    samples_this_tick: u32,
    tick: u32,
    /// Extra ticks added to the current row by `EEx`
    row_delay: u32,
}

impl PlaybackCursor {
    fn new(sample_rate: u32) -> Self {
        Self {
            order: 0,
            next_order: 0,
            row: 0,
            next_row: 0,
            bpm: DEFAULT_BPM,
            speed: DEFAULT_SPEED,
            samples_per_tick: samples_per_tick(sample_rate, DEFAULT_BPM),
            samples_this_tick: 0,
            tick: 0,
            row_delay: 0,
        }
    }
}

/// Plays a module through four resampling channels.
///
/// Channels 0 and 3 are panned left, 1 and 2 right.
pub struct Player<'m> {
    module: &'m Module<'m>,
    config: PlayerConfig,
    cursor: PlaybackCursor,
    effects: [EffectState; CHANNELS],
    mixers: [MixerChannel<SampleStreamer<'m>>; CHANNELS],
    state: PlayState,
    /// Row 0 has been committed
    primed: bool,
    rng: SmallRng,
    row_hook: Option<RowHook<'m>>,
    wrap_hook: Option<WrapHook<'m>>,
}

impl<'m> Player<'m> {
    pub fn new(module: &'m Module<'m>, config: PlayerConfig) -> Self {
        let sample_rate = config.sample_rate.max(1);
        let config = PlayerConfig {
            sample_rate,
            ..config
        };
        let mut player = Self {
            module,
            config,
            cursor: PlaybackCursor::new(sample_rate),
            effects: [EffectState::default(); CHANNELS],
            mixers: core::array::from_fn(|ch| MixerChannel::new(ch, sample_rate)),
            state: PlayState::Playing,
            primed: false,
            rng: SmallRng::seed_from_u64(RNG_SEED),
            row_hook: None,
            wrap_hook: None,
        };
        player.clear();
        player
    }

    pub fn module(&self) -> &'m Module<'m> {
        self.module
    }

    pub fn config(&self) -> PlayerConfig {
        self.config
    }

    pub fn is_ended(&self) -> bool {
        self.state == PlayState::Ended
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.config.repeat = repeat;
    }

    pub fn set_pattern_repeat(&mut self, pattern_repeat: bool) {
        self.config.pattern_repeat = pattern_repeat;
    }

    /// Install a hook called once per committed row.
    pub fn set_row_hook(&mut self, hook: impl FnMut(Position) + Send + 'm) {
        self.row_hook = Some(Box::new(hook));
    }

    pub fn clear_row_hook(&mut self) {
        self.row_hook = None;
    }

    /// Install a hook called each time repeat playback jumps back to an
    /// earlier order, at the end of the song or on a backward jump.
    pub fn set_wrap_hook(&mut self, hook: impl FnMut() + Send + 'm) {
        self.wrap_hook = Some(Box::new(hook));
    }

    pub fn clear_wrap_hook(&mut self) {
        self.wrap_hook = None;
    }

    /// Set the tempo and recompute the tick length.
    pub fn set_bpm(&mut self, bpm: u8) {
        self.cursor.bpm = bpm;
        self.cursor.samples_per_tick = samples_per_tick(self.config.sample_rate, bpm);
    }

    pub fn bpm(&self) -> u8 {
        self.cursor.bpm
    }

    pub fn speed(&self) -> u8 {
        self.cursor.speed
    }

    pub fn samples_per_tick(&self) -> u32 {
        self.cursor.samples_per_tick
    }

    pub fn set_muted(&mut self, channel: usize, muted: bool) {
        if let Some(mixer) = self.mixers.get_mut(channel) {
            mixer.set_muted(muted);
        }
    }

    pub fn is_muted(&self, channel: usize) -> bool {
        self.mixers.get(channel).is_some_and(|m| m.is_muted())
    }

    /// Effect memory of a channel.
    pub fn channel_state(&self, channel: usize) -> Option<&EffectState> {
        self.effects.get(channel)
    }

    /// Mixer of a channel.
    pub fn mixer(&self, channel: usize) -> Option<&MixerChannel<SampleStreamer<'m>>> {
        self.mixers.get(channel)
    }

    pub fn position(&self) -> Position {
        Position {
            order: self.cursor.order as u8,
            pattern: self.module.pattern_at(self.cursor.order) as u8,
            row: self.cursor.row as u8,
            tick: self.cursor.tick,
        }
    }

    /// Rewind to the start of the song and leave the Ended state.
    pub fn reset(&mut self) {
        self.cursor = PlaybackCursor::new(self.config.sample_rate);
        self.state = PlayState::Playing;
        self.rng = SmallRng::seed_from_u64(RNG_SEED);
        self.clear();
    }

    /// Silence every channel and drop effect memory. The next render
    /// commits the upcoming row.
    pub fn clear(&mut self) {
        self.cursor.speed = DEFAULT_SPEED;
        self.cursor.tick = 0;
        self.cursor.samples_this_tick = 0;
        self.cursor.row_delay = 0;
        self.effects = [EffectState::default(); CHANNELS];
        for (ch, mixer) in self.mixers.iter_mut().enumerate() {
            let muted = mixer.is_muted();
            *mixer = MixerChannel::new(ch, self.config.sample_rate);
            mixer.set_muted(muted);
            mixer.set_source(SampleStreamer::new(self.module));
            mixer.set_volume(0);
            mixer.set_rate(0);
        }
        self.primed = false;
    }

    /// Mix the next `left.len()` frames into the two accumulators,
    /// crossing tick and row boundaries as needed. Both slices are
    /// cleared first and must be the same length.
    pub(crate) fn mix_block<const INTERPOLATE: bool>(
        &mut self,
        left: &mut [i32],
        right: &mut [i32],
    ) {
        left.fill(0);
        right.fill(0);
        if self.state == PlayState::Ended {
            return;
        }
        if !self.primed {
            self.primed = true;
            self.advance_row();
        }

        let total = left.len().min(right.len());
        let mut done = 0;
        while done < total && self.state == PlayState::Playing {
            let spt = self.cursor.samples_per_tick;
            let len = (spt.saturating_sub(self.cursor.samples_this_tick) as usize).min(total - done);
            let span = done..done + len;
            for (ch, mixer) in self.mixers.iter_mut().enumerate() {
                let out = if ch == 0 || ch == 3 {
                    &mut left[span.clone()]
                } else {
                    &mut right[span.clone()]
                };
                if INTERPOLATE {
                    mixer.mix(out);
                } else {
                    mixer.mix_nearest(out);
                }
            }
            self.cursor.samples_this_tick += len as u32;
            done += len;

            if self.cursor.samples_this_tick < spt {
                break;
            }
            self.cursor.tick += 1;
            self.cursor.samples_this_tick = 0;
            self.handle_tick();
        }
    }

    fn handle_tick(&mut self) {
        if self.cursor.tick >= self.cursor.speed as u32 + self.cursor.row_delay {
            self.advance_row();
        } else {
            for ch in 0..CHANNELS {
                self.tick_effect(ch);
            }
            self.retrigger_pass();
        }
    }

    /// Commit the upcoming row, or end the song if there is none.
    fn advance_row(&mut self) {
        let song_length = self.module.song_length as usize;
        let cursor = &mut self.cursor;

        if self.config.repeat {
            if cursor.next_order >= song_length {
                cursor.next_order = 0;
            }
            if cursor.next_order < cursor.order {
                if let Some(hook) = self.wrap_hook.as_mut() {
                    hook();
                }
            }
        } else if cursor.next_order < cursor.order || cursor.next_order >= song_length {
            self.state = PlayState::Ended;
            return;
        }
        if song_length == 0 {
            self.state = PlayState::Ended;
            return;
        }

        cursor.order = cursor.next_order;
        cursor.row = cursor.next_row;
        cursor.tick = 0;
        cursor.row_delay = 0;

        cursor.next_row += 1;
        if cursor.next_row >= ROWS {
            cursor.next_row = 0;
            cursor.next_order = if self.config.pattern_repeat {
                cursor.order
            } else {
                cursor.order + 1
            };
        }
        if self.config.repeat && cursor.next_order >= song_length {
            cursor.next_order = 0;
        }

        for ch in 0..CHANNELS {
            self.set_row(ch);
        }
        for ch in 0..CHANNELS {
            self.apply_row(ch);
        }

        let position = self.position();
        if let Some(hook) = self.row_hook.as_mut() {
            hook(position);
        }
    }

    /// Load the current row's cell into the channel's effect memory.
    fn set_row(&mut self, ch: usize) {
        let cell = self.module.cell_at(self.cursor.order, self.cursor.row, ch);
        let mut fx = self.effects[ch];
        fx.effect = cell.effect();

        match cell.note() {
            None => {
                fx.reset_note = false;
                fx.row_note = 0;
            }
            Some(note) => {
                fx.row_note = note;
                if fx.effect.holds_note() {
                    fx.reset_note = false;
                } else {
                    fx.reset_note = true;
                    fx.note = note;
                }
            }
        }

        let (sample, finetune) = match self.module.sample(cell.sample) {
            Some(header) => {
                if cell.sample != fx.sample && fx.sample != 0 {
                    fx.reset_note = true;
                }
                fx.volume = header.default_volume();
                (cell.sample, header.finetune)
            }
            // 0 and out-of-range numbers keep the playing sample
            None => {
                let current = self.mixers[ch].source().map_or(0, |s| s.sample());
                (current, fx.finetune)
            }
        };

        if sample == 0 && fx.reset_note {
            fx.sample = 0;
            fx.volume = 0;
            fx.finetune = 0;
        } else {
            fx.sample = sample;
            fx.finetune = finetune;
        }
        self.effects[ch] = fx;
    }

    /// Row-level effect dispatch, then commit volume and any note trigger.
    fn apply_row(&mut self, ch: usize) {
        let mut fx = self.effects[ch];
        let mut start = NOTE_START;
        let mut keep_vibrato = false;
        let mut keep_tremolo = false;
        let mut push_volume = true;

        fx.retrigger = 0;
        fx.delay_tick = 0;

        match fx.effect {
            Effect::TonePorta(param) => {
                fx.reset_note = false;
                if fx.row_note != 0 {
                    fx.porta_target = fx.row_note;
                }
                if param != 0 {
                    fx.porta_speed = param;
                }
            }
            Effect::Vibrato(param) | Effect::VibratoVolSlide(param) => {
                if fx.vibrato_wave & WAVE_CONTINUE != 0 {
                    if fx.last_vibrato != 0 {
                        self.mixers[ch].set_rate(finetuned_rate(fx.last_vibrato, fx.finetune));
                    }
                } else {
                    fx.vibrato_pos = 0;
                }
                if param != 0 {
                    if let Effect::Vibrato(_) = fx.effect {
                        fx.vibrato_speed = param;
                    } else {
                        fx.vibrato_volume = param;
                    }
                }
                keep_vibrato = true;
            }
            Effect::TonePortaVolSlide(param) => {
                fx.reset_note = false;
                if fx.row_note != 0 {
                    fx.porta_target = fx.row_note;
                }
                if param != 0 {
                    fx.porta_volume = param;
                }
            }
            Effect::Tremolo(param) => {
                if fx.tremolo_wave & WAVE_CONTINUE != 0 {
                    let volume = if fx.last_tremolo != 0 {
                        fx.last_tremolo
                    } else {
                        fx.volume
                    };
                    self.mixers[ch].set_volume(volume);
                } else {
                    fx.tremolo_pos = 0;
                }
                if param != 0 {
                    fx.tremolo_speed = param;
                }
                keep_tremolo = true;
                push_volume = false;
            }
            Effect::SampleOffset(param) => {
                let offset = (param as u32) << 8;
                if offset != 0 {
                    fx.sample_offset = offset;
                }
                start = fx.sample_offset;
                let mixer = &mut self.mixers[ch];
                if let Some(streamer) = mixer.source_mut() {
                    streamer.seek(start);
                }
                if !fx.reset_note {
                    mixer.flush();
                }
            }
            Effect::VolumeSlide(param) => {
                if param != 0 {
                    fx.volume_slide = param;
                }
            }
            Effect::PositionJump(param) => {
                let target = param as usize;
                self.cursor.next_order = if target >= self.module.song_length as usize {
                    0
                } else {
                    target
                };
                self.cursor.next_row = 0;
            }
            Effect::SetVolume(param) => fx.volume = param.min(64),
            Effect::PatternBreak(param) => {
                if !self.config.pattern_repeat {
                    self.cursor.next_order = self.cursor.order + 1;
                }
                let bcd = param & 0x7F;
                let row = (bcd & 0x0F) as usize + (bcd >> 4) as usize * 10;
                self.cursor.next_row = if row >= ROWS { 0 } else { row };
            }
            Effect::FinePortaUp(amount) => {
                if fx.note != 0 {
                    fx.note = clamp_period(fx.note.saturating_sub(amount as u16));
                    self.mixers[ch].set_rate(finetuned_rate(fx.note, fx.finetune));
                }
            }
            Effect::FinePortaDown(amount) => {
                if fx.note != 0 {
                    fx.note = clamp_period(fx.note.saturating_add(amount as u16));
                    self.mixers[ch].set_rate(finetuned_rate(fx.note, fx.finetune));
                }
            }
            Effect::SetVibratoWaveform(wave) => fx.vibrato_wave = wave & 0x07,
            Effect::SetTremoloWaveform(wave) => fx.tremolo_wave = wave & 0x07,
            Effect::SetFinetune(finetune) => fx.finetune = finetune & 0x0F,
            Effect::PatternLoop(0) => fx.loop_row = self.cursor.row as u8,
            Effect::PatternLoop(count) => {
                if fx.loop_count == 0 {
                    fx.loop_count = count + 1;
                }
                fx.loop_count -= 1;
                if fx.loop_count != 0 {
                    self.cursor.next_row = fx.loop_row as usize;
                    self.cursor.next_order = self.cursor.order;
                }
            }
            Effect::RetriggerNote(interval) => {
                fx.retrigger = interval;
                fx.reset_note = true;
            }
            Effect::FineVolumeSlideUp(amount) => fx.volume = (fx.volume + amount).min(64),
            Effect::FineVolumeSlideDown(amount) => fx.volume = fx.volume.saturating_sub(amount),
            Effect::NoteCut(0) => fx.volume = 0,
            Effect::NoteDelay(delay) => {
                fx.delay_tick = delay;
                if delay as u32 != self.cursor.tick {
                    self.effects[ch] = fx;
                    return;
                }
                if fx.row_note != 0 {
                    fx.note = fx.row_note;
                    fx.reset_note = true;
                }
            }
            Effect::PatternDelay(rows) => {
                self.cursor.row_delay = rows as u32 * self.cursor.speed as u32;
            }
            Effect::SetSpeed(speed) => self.cursor.speed = speed,
            Effect::SetTempo(bpm) => self.set_bpm(bpm),
            Effect::Unknown(code) => log::trace!("ignoring effect {:03X} on channel {}", code, ch),
            Effect::None
            | Effect::Arpeggio(_)
            | Effect::PortaUp(_)
            | Effect::PortaDown(_)
            | Effect::NoteCut(_) => {}
        }

        let mixer = &mut self.mixers[ch];
        if push_volume {
            mixer.set_volume(fx.volume);
        }
        if !keep_vibrato {
            fx.last_vibrato = 0;
        }
        if !keep_tremolo {
            fx.last_tremolo = 0;
        }

        if fx.reset_note {
            if let Some(streamer) = mixer.source_mut() {
                streamer.trigger(fx.sample, start);
            }
            let rate = match fx.note {
                0 => 0,
                note => finetuned_rate(note, fx.finetune),
            };
            mixer.set_rate(rate);
            mixer.flush();
        }
        self.effects[ch] = fx;
    }

    /// Per-tick effect processing for ticks after the row's first.
    fn tick_effect(&mut self, ch: usize) {
        let mut fx = self.effects[ch];
        let tick = self.cursor.tick;
        let mut vibrato = false;
        let mut tremolo = false;

        match fx.effect {
            Effect::None => return,
            Effect::Arpeggio(param) => {
                let param = if param != 0 {
                    fx.arpeggio_memory = param;
                    param
                } else {
                    fx.arpeggio_memory
                };
                if fx.note != 0 {
                    let period = match tick % 3 {
                        0 => fx.note,
                        1 => arpeggio_period(fx.note, param >> 4),
                        _ => arpeggio_period(fx.note, param & 0x0F),
                    };
                    self.mixers[ch].set_rate(finetuned_rate(period, fx.finetune));
                }
                self.effects[ch] = fx;
                return;
            }
            Effect::PortaUp(param) => {
                if fx.note != 0 {
                    fx.note = clamp_period(fx.note.saturating_sub(param as u16));
                }
            }
            Effect::PortaDown(param) => {
                if fx.note != 0 {
                    fx.note = clamp_period(fx.note.saturating_add(param as u16));
                }
            }
            Effect::TonePorta(_) => {
                if !fx.portamento() {
                    log::trace!("no portamento target on channel {}", ch);
                }
            }
            Effect::Vibrato(_) => {
                fx.vibrato(&mut self.rng);
                vibrato = true;
            }
            Effect::TonePortaVolSlide(param) => {
                if !fx.portamento() {
                    log::trace!("no portamento target on channel {}", ch);
                }
                fx.slide_volume(if param != 0 { param } else { fx.porta_volume });
            }
            Effect::VibratoVolSlide(param) => {
                fx.vibrato(&mut self.rng);
                vibrato = true;
                fx.slide_volume(if param != 0 { param } else { fx.vibrato_volume });
            }
            Effect::Tremolo(_) => {
                fx.tremolo(&mut self.rng);
                tremolo = true;
            }
            Effect::VolumeSlide(param) => {
                fx.slide_volume(if param != 0 { param } else { fx.volume_slide });
            }
            Effect::NoteCut(at) => {
                if at as u32 == tick {
                    fx.volume = 0;
                }
            }
            _ => {}
        }

        let period = if vibrato { fx.last_vibrato } else { fx.note };
        let mixer = &mut self.mixers[ch];
        if period != 0 {
            mixer.set_rate(finetuned_rate(period, fx.finetune));
        }
        mixer.set_volume(if tremolo { fx.last_tremolo } else { fx.volume });
        self.effects[ch] = fx;
    }

    /// Re-run the row for channels whose retrigger interval or note delay
    /// lands on this tick.
    fn retrigger_pass(&mut self) {
        let tick = self.cursor.tick;
        for ch in 0..CHANNELS {
            let fx = &self.effects[ch];
            let retrigger = fx.retrigger != 0 && tick % fx.retrigger as u32 == 0;
            if retrigger || fx.delay_tick as u32 == tick {
                self.apply_row(ch);
            }
        }
    }
}
