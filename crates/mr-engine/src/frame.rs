//! Stereo output frame.

/// One rendered stereo frame (16-bit signed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    pub const fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Frame as normalized `f32` samples for float output devices.
    pub fn to_f32(self) -> [f32; 2] {
        [self.left as f32 / 32768.0, self.right as f32 / 32768.0]
    }
}
