//! Audio output trait and error types.

use mr_engine::Frame;

/// Error type for audio operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    /// No output device available
    #[error("no audio output device available")]
    NoDevice,
    /// Failed to query or configure the device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create the output stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Failed to start or pause the stream
    #[error("playback error: {0}")]
    Playback(String),
}

/// Trait for audio output backends.
pub trait AudioOutput {
    /// Device sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Queue frames for output, spinning while the buffer is full.
    /// Returns the number queued. A short count means the device stopped
    /// pulling frames.
    fn write(&mut self, frames: &[Frame]) -> usize;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_backend_message() {
        let err = AudioError::StreamCreate("format not supported".into());
        assert_eq!(err.to_string(), "stream create error: format not supported");
        assert_eq!(AudioError::NoDevice.to_string(), "no audio output device available");
    }
}
