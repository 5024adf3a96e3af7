//! Headless controller for the modrender tracker player.
//!
//! Provides a single API for loading modules, real-time playback on a
//! worker thread, and offline rendering to raw PCM or WAV.

mod wav;

use mr_audio::{AudioOutput, CpalOutput};
use mr_engine::Player;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

// Re-export common types so callers don't need mr-ir/mr-engine directly.
pub use mr_engine::{Frame, PlayerConfig, Position};
pub use mr_formats::FormatError;
pub use mr_ir::Module;

pub use wav::{frames_to_wav, write_wav};

/// Frames rendered per block on both the real-time and offline paths.
const BLOCK: usize = 1024;

/// Set in a packed position once the first row has been committed.
const POSITION_VALID: u32 = 1 << 24;

/// Raw interleaved stereo output encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcmFormat {
    /// Signed 16-bit little-endian, interpolated with the 70/30 cross-mix
    S16,
    /// Signed 16-bit little-endian, nearest-sample and unweighted
    S16Fast,
    /// Unsigned 8-bit, nearest-sample
    U8,
}

/// Headless controller: owns a module and manages playback.
///
/// The controller keeps the module file itself and parses a borrowed
/// view whenever it plays or renders, so sample data is never copied.
pub struct Controller {
    data: Arc<[u8]>,
    repeat: bool,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    position: Arc<AtomicU32>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new() -> Self {
        Self {
            data: mr_formats::save_mod(&mr_formats::blank_module()).into(),
            repeat: false,
            playback: None,
        }
    }

    // --- Module management ---

    /// The loaded module, borrowing its samples from the controller.
    pub fn module(&self) -> Module<'_> {
        // `data` only ever holds bytes that parsed
        mr_formats::load_mod(&self.data).unwrap_or_else(|_| mr_formats::blank_module())
    }

    /// Take over a module file. Passing an `Arc<[u8]>` shares the buffer
    /// as is. On a parse error the previous module stays loaded.
    pub fn load_mod(&mut self, data: impl Into<Arc<[u8]>>) -> Result<(), FormatError> {
        let data = data.into();
        {
            let module = mr_formats::load_mod(&data)?;
            log::info!(
                "loaded \"{}\": {} orders, {} patterns",
                module.name(),
                module.song_length,
                module.pattern_count()
            );
        }
        self.stop();
        self.data = data;
        Ok(())
    }

    /// Loop back to the first order instead of ending. Applies to the next
    /// `play` or render.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    // --- Real-time playback ---

    pub fn play(&mut self) {
        self.stop();

        let data = self.data.clone();
        let repeat = self.repeat;
        let stop_signal = Arc::new(AtomicBool::new(false));
        let position = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stop = stop_signal.clone();
        let pos = position.clone();
        let done = finished.clone();

        let thread = std::thread::spawn(move || {
            audio_thread(data, repeat, stop, pos, done);
        });

        self.playback = Some(PlaybackHandle {
            stop_signal,
            position,
            finished,
            thread: Some(thread),
        });
    }

    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                if handle.join().is_err() {
                    log::error!("audio thread panicked");
                }
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    /// Row currently playing, or `None` before the first row and after
    /// playback finished.
    pub fn position(&self) -> Option<Position> {
        let pb = self.playback.as_ref()?;
        if pb.finished.load(Ordering::Relaxed) {
            return None;
        }
        unpack_position(pb.position.load(Ordering::Relaxed))
    }

    // --- Offline rendering ---

    fn player<'m>(&self, module: &'m Module<'m>, sample_rate: u32) -> Player<'m> {
        Player::new(
            module,
            PlayerConfig {
                sample_rate,
                repeat: self.repeat,
                ..Default::default()
            },
        )
    }

    /// Render blended frames until the song ends or `max_frames` is reached.
    /// The final block may carry trailing silence after the end.
    pub fn render_frames(&self, sample_rate: u32, max_frames: usize) -> Vec<Frame> {
        let module = self.module();
        let mut player = self.player(&module, sample_rate);
        let mut frames = Vec::with_capacity(max_frames.min(sample_rate as usize * 60));
        while !player.is_ended() && frames.len() < max_frames {
            let start = frames.len();
            let n = (max_frames - start).min(BLOCK);
            frames.resize(start + n, Frame::silence());
            player.render_frames(&mut frames[start..]);
        }
        frames
    }

    pub fn render_to_wav(&self, sample_rate: u32, max_seconds: u32) -> Vec<u8> {
        let max_frames = sample_rate as usize * max_seconds as usize;
        let frames = self.render_frames(sample_rate, max_frames);
        wav::frames_to_wav(&frames, sample_rate)
    }

    /// Render interleaved raw PCM until the song ends or `max_frames`.
    pub fn render_pcm(&self, format: PcmFormat, sample_rate: u32, max_frames: usize) -> Vec<u8> {
        let module = self.module();
        let mut player = self.player(&module, sample_rate);
        let mut out = Vec::new();
        let mut s16 = [0i16; BLOCK * 2];
        let mut u8s = [0u8; BLOCK * 2];
        let mut done = 0;
        while !player.is_ended() && done < max_frames {
            let n = (max_frames - done).min(BLOCK);
            match format {
                PcmFormat::S16 | PcmFormat::S16Fast => {
                    let buf = &mut s16[..n * 2];
                    if format == PcmFormat::S16 {
                        player.render_s16(buf);
                    } else {
                        player.render_s16_fast(buf);
                    }
                    out.extend(buf.iter().flat_map(|s| s.to_le_bytes()));
                }
                PcmFormat::U8 => {
                    let buf = &mut u8s[..n * 2];
                    player.render_u8(buf);
                    out.extend_from_slice(buf);
                }
            }
            done += n;
        }
        out
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

fn pack_position(pos: Position) -> u32 {
    POSITION_VALID | (pos.order as u32) << 16 | (pos.pattern as u32) << 8 | pos.row as u32
}

fn unpack_position(packed: u32) -> Option<Position> {
    if packed & POSITION_VALID == 0 {
        return None;
    }
    Some(Position {
        order: (packed >> 16) as u8,
        pattern: (packed >> 8) as u8,
        row: packed as u8,
        tick: 0,
    })
}

fn audio_thread(
    data: Arc<[u8]>,
    repeat: bool,
    stop_signal: Arc<AtomicBool>,
    position: Arc<AtomicU32>,
    finished: Arc<AtomicBool>,
) {
    let module = match mr_formats::load_mod(&data) {
        Ok(module) => module,
        Err(e) => {
            log::error!("{}", e);
            finished.store(true, Ordering::Relaxed);
            return;
        }
    };
    let (mut output, consumer) = match CpalOutput::new() {
        Ok(output) => output,
        Err(e) => {
            log::error!("{}", e);
            finished.store(true, Ordering::Relaxed);
            return;
        }
    };

    let sample_rate = output.sample_rate();
    let config = PlayerConfig {
        sample_rate,
        repeat,
        ..Default::default()
    };
    let mut player = Player::new(&module, config);
    player.set_row_hook(move |pos| position.store(pack_position(pos), Ordering::Relaxed));
    player.set_wrap_hook(|| log::debug!("song wrapped to the first order"));

    if let Err(e) = output.build_stream(consumer) {
        log::error!("{}", e);
        finished.store(true, Ordering::Relaxed);
        return;
    }
    if let Err(e) = output.start() {
        log::warn!("{}", e);
    }

    let mut block = [Frame::silence(); BLOCK];
    let mut stalled = false;
    while !player.is_ended() && !stop_signal.load(Ordering::Relaxed) {
        player.render_frames(&mut block);
        if output.write(&block) < BLOCK {
            log::warn!("output device stopped pulling frames");
            stalled = true;
            break;
        }
    }

    if player.is_ended() && !stalled {
        log::debug!("song ended, draining output");
        let silence = [Frame::silence(); BLOCK];
        for _ in 0..(sample_rate as usize / BLOCK).max(1) {
            if stop_signal.load(Ordering::Relaxed) || output.write(&silence) < BLOCK {
                break;
            }
        }
    }
    if let Err(e) = output.stop() {
        log::warn!("{}", e);
    }

    finished.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_ir::Cell;

    /// One pattern with a looping note on channel 0.
    fn tone_module() -> Vec<u8> {
        let mut module = mr_formats::blank_module();
        let wave: Vec<u8> = (0..64).map(|i| if i < 32 { 0x50 } else { 0xB0 }).collect();
        module.set_sample_data(1, &wave);
        module.samples[0].loop_start = 0;
        module.samples[0].loop_length = 64;
        *module.patterns[0].cell_mut(0, 0) = Cell {
            period: 428,
            sample: 1,
            effect: 0,
        };
        mr_formats::save_mod(&module)
    }

    #[test]
    fn position_packing() {
        assert_eq!(unpack_position(0), None);
        let pos = Position {
            order: 3,
            pattern: 17,
            row: 63,
            tick: 0,
        };
        assert_eq!(unpack_position(pack_position(pos)), Some(pos));
    }

    #[test]
    fn blank_controller_renders_one_pattern_of_silence() {
        let controller = Controller::new();
        // 64 rows * 6 ticks * 882 samples
        let frames = controller.render_frames(44100, 44100 * 10);
        assert!(frames.len() >= 64 * 6 * 882);
        assert!(frames.len() < 64 * 6 * 882 + BLOCK);
        assert!(frames.iter().all(|f| *f == Frame::silence()));
    }

    #[test]
    fn loaded_module_is_audible() {
        let mut controller = Controller::new();
        controller.load_mod(tone_module()).unwrap();
        let frames = controller.render_frames(44100, 4096);
        assert_eq!(frames.len(), 4096);
        assert!(frames.iter().any(|f| f.left != 0));
    }

    #[test]
    fn repeat_fills_the_cap() {
        let mut controller = Controller::new();
        controller.load_mod(tone_module()).unwrap();
        controller.set_repeat(true);
        let wav = controller.render_to_wav(8000, 12);
        assert_eq!(wav.len(), 44 + 8000 * 12 * 4);
    }

    #[test]
    fn pcm_sizes_follow_format() {
        let mut controller = Controller::new();
        controller.load_mod(tone_module()).unwrap();
        assert_eq!(controller.render_pcm(PcmFormat::S16, 22050, 1500).len(), 1500 * 4);
        assert_eq!(controller.render_pcm(PcmFormat::S16Fast, 22050, 1500).len(), 1500 * 4);
        assert_eq!(controller.render_pcm(PcmFormat::U8, 22050, 1500).len(), 1500 * 2);
    }

    #[test]
    fn bad_data_keeps_previous_module() {
        let mut controller = Controller::new();
        controller.load_mod(tone_module()).unwrap();
        let err = controller.load_mod(vec![0u8; 16]).unwrap_err();
        assert!(matches!(err, FormatError::TruncatedFile { .. }));
        assert_eq!(controller.module().sample(1).map(|s| s.length), Some(64));
    }

    #[test]
    fn playback_shares_the_loaded_buffer() {
        let data: Arc<[u8]> = tone_module().into();
        let mut controller = Controller::new();
        controller.load_mod(data.clone()).unwrap();
        assert_eq!(Arc::strong_count(&data), 2);

        let module = controller.module();
        assert!(matches!(module.pcm, std::borrow::Cow::Borrowed(_)));
        let pcm = module.sample_data(1).as_ptr_range();
        let file = data.as_ptr_range();
        assert!(file.start <= pcm.start && pcm.end <= file.end);
    }
}
