//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use mr_engine::Frame;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::traits::{AudioError, AudioOutput};

/// How long `write` waits for the device to free ring space before it
/// treats the stream as stalled.
const STALL_TIMEOUT: Duration = Duration::from_millis(500);

/// Ring buffer length in frames: about 100ms at the device rate.
fn buffer_frames(sample_rate: u32) -> usize {
    (sample_rate as usize / 10).max(1024)
}

/// Push `frames` into the ring, spinning while it is full. Gives up once
/// the consumer has freed no space for `timeout`. Returns the number of
/// frames queued.
fn push_blocking(
    producer: &mut impl Producer<Item = Frame>,
    frames: &[Frame],
    timeout: Duration,
) -> usize {
    let mut rest = frames;
    let mut last_progress = Instant::now();
    while !rest.is_empty() {
        let pushed = producer.push_slice(rest);
        if pushed > 0 {
            rest = &rest[pushed..];
            last_progress = Instant::now();
        } else if last_progress.elapsed() >= timeout {
            break;
        } else {
            std::hint::spin_loop();
        }
    }
    frames.len() - rest.len()
}

/// CPAL-based audio output.
///
/// Rendered frames go through a lock-free ring buffer so the device
/// callback never waits on the renderer.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device. Returns the output together with
    /// the consumer half that `build_stream` hands to the device callback.
    pub fn new() -> Result<(Self, HeapCons<Frame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let mut config: StreamConfig = config.into();
        config.channels = 2;
        log::debug!(
            "output device {:?} at {} Hz",
            device.name().unwrap_or_default(),
            config.sample_rate.0
        );

        let rb = HeapRb::<Frame>::new(buffer_frames(config.sample_rate.0));
        let (producer, consumer) = rb.split();

        let output = Self {
            device,
            config,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
        };
        Ok((output, consumer))
    }

    /// Build and start the device stream.
    pub fn build_stream(&mut self, mut consumer: HeapCons<Frame>) -> Result<(), AudioError> {
        let running = self.running.clone();
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for chunk in data.chunks_mut(channels) {
                        let [left, right] = consumer.try_pop().unwrap_or_default().to_f32();
                        for (i, sample) in chunk.iter_mut().enumerate() {
                            *sample = match i {
                                0 => left,
                                1 => right,
                                _ => 0.0,
                            };
                        }
                    }
                },
                |err| log::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> usize {
        push_blocking(&mut self.producer, frames, STALL_TIMEOUT)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_waits_for_space_then_gives_up() {
        let (mut producer, _consumer) = HeapRb::<Frame>::new(4).split();
        let frames = [Frame::new(100, -100); 10];
        let start = Instant::now();
        let queued = push_blocking(&mut producer, &frames, Duration::from_millis(20));
        assert_eq!(queued, 4);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn write_drains_through_a_live_consumer() {
        let (mut producer, mut consumer) = HeapRb::<Frame>::new(4).split();
        let frames = [Frame::new(1, 2); 64];
        let reader = std::thread::spawn(move || {
            let mut seen = 0;
            while seen < 64 {
                if consumer.try_pop().is_some() {
                    seen += 1;
                }
            }
            seen
        });
        assert_eq!(push_blocking(&mut producer, &frames, Duration::from_secs(5)), 64);
        assert_eq!(reader.join().unwrap(), 64);
    }

    #[test]
    fn ring_holds_a_tenth_of_a_second() {
        assert_eq!(buffer_frames(48000), 4800);
        assert_eq!(buffer_frames(8000), 1024);
    }
}
