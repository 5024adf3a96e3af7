//! Effect command types for tracker patterns.

/// Effect column command, decoded from the 12-bit on-disk code.
///
/// Parameters are kept as the raw parameter byte (or nibble for the
/// extended `Exy` commands) because the effect memory in the sequencer
/// stores them unsplit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Effect {
    #[default]
    None,

    // === Arpeggio & Portamento ===
    /// Arpeggio: cycle between note, note+x, note+y each tick
    Arpeggio(u8),
    /// Slide pitch up (period down) by amount per tick
    PortaUp(u8),
    /// Slide pitch down (period up) by amount per tick
    PortaDown(u8),
    /// Slide toward target note
    TonePorta(u8),
    /// Vibrato: speed in the high nibble, depth in the low nibble
    Vibrato(u8),
    /// Tone portamento + volume slide
    TonePortaVolSlide(u8),
    /// Vibrato + volume slide
    VibratoVolSlide(u8),

    // === Tremolo & Volume ===
    /// Tremolo (volume oscillation)
    Tremolo(u8),
    /// Set sample offset (in 256-byte units)
    SampleOffset(u8),
    /// Volume slide: up in the high nibble, down in the low nibble
    VolumeSlide(u8),
    /// Jump to order position
    PositionJump(u8),
    /// Set channel volume (0-64)
    SetVolume(u8),
    /// Break to row in next pattern (decimal-encoded parameter)
    PatternBreak(u8),

    // === Extended effects (Exy) ===
    /// Fine porta up (once per row)
    FinePortaUp(u8),
    /// Fine porta down (once per row)
    FinePortaDown(u8),
    /// Set vibrato waveform (0=sine, 1=ramp, 2=square, 3=random; bit 2=no retrig)
    SetVibratoWaveform(u8),
    /// Set finetune index (0-15)
    SetFinetune(u8),
    /// Pattern loop (0=set start, n=loop n times)
    PatternLoop(u8),
    /// Set tremolo waveform
    SetTremoloWaveform(u8),
    /// Retrigger note every n ticks
    RetriggerNote(u8),
    /// Fine volume slide up (once per row)
    FineVolumeSlideUp(u8),
    /// Fine volume slide down (once per row)
    FineVolumeSlideDown(u8),
    /// Cut note after n ticks
    NoteCut(u8),
    /// Delay note by n ticks
    NoteDelay(u8),
    /// Delay pattern by n rows
    PatternDelay(u8),

    // === Speed & Tempo ===
    /// Set ticks per row (speed)
    SetSpeed(u8),
    /// Set BPM tempo
    SetTempo(u8),

    /// Any code the player does not act on (panning, filter, glissando...)
    Unknown(u16),
}

impl Effect {
    /// Decode a 12-bit effect code.
    pub fn decode(code: u16) -> Effect {
        let code = code & 0xFFF;
        let param = code as u8;
        let val = param & 0x0F;
        match code >> 8 {
            0x0 if param == 0 => Effect::None,
            0x0 => Effect::Arpeggio(param),
            0x1 => Effect::PortaUp(param),
            0x2 => Effect::PortaDown(param),
            0x3 => Effect::TonePorta(param),
            0x4 => Effect::Vibrato(param),
            0x5 => Effect::TonePortaVolSlide(param),
            0x6 => Effect::VibratoVolSlide(param),
            0x7 => Effect::Tremolo(param),
            0x9 => Effect::SampleOffset(param),
            0xA => Effect::VolumeSlide(param),
            0xB => Effect::PositionJump(param),
            0xC => Effect::SetVolume(param),
            0xD => Effect::PatternBreak(param),
            0xE => match param >> 4 {
                0x1 => Effect::FinePortaUp(val),
                0x2 => Effect::FinePortaDown(val),
                0x4 => Effect::SetVibratoWaveform(val),
                0x5 => Effect::SetFinetune(val),
                0x6 => Effect::PatternLoop(val),
                0x7 => Effect::SetTremoloWaveform(val),
                0x9 => Effect::RetriggerNote(val),
                0xA => Effect::FineVolumeSlideUp(val),
                0xB => Effect::FineVolumeSlideDown(val),
                0xC => Effect::NoteCut(val),
                0xD => Effect::NoteDelay(val),
                0xE => Effect::PatternDelay(val),
                _ => Effect::Unknown(code),
            },
            0xF if param < 0x20 => Effect::SetSpeed(param),
            0xF => Effect::SetTempo(param),
            _ => Effect::Unknown(code),
        }
    }

    /// Returns true for effects that take the row's note as a target
    /// instead of retriggering it.
    pub fn holds_note(&self) -> bool {
        matches!(
            self,
            Effect::TonePorta(_) | Effect::TonePortaVolSlide(_) | Effect::NoteDelay(_)
        )
    }
}
