//! Note names and the playable period table.

use arrayvec::ArrayString;

/// Periods of the 36 playable notes, C-1 through B-3 (finetune 0).
pub const NOTE_PERIODS: [u16; 36] = [
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, //
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, //
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113,
];

const NAMES: [&str; 12] = [
    "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
];

/// Index of a period in [`NOTE_PERIODS`], if it is an exact note.
pub fn note_index(period: u16) -> Option<usize> {
    NOTE_PERIODS.iter().position(|&p| p == period)
}

/// Period of the note at `index` (0 = C-1).
pub fn period_for_note(index: usize) -> Option<u16> {
    NOTE_PERIODS.get(index).copied()
}

/// Tracker-style name such as `C-1` or `A#3`. Periods that are not an
/// exact note are shown as `???`, and 0 as `---`.
pub fn note_name(period: u16) -> ArrayString<3> {
    let mut name = ArrayString::new();
    match (period, note_index(period)) {
        (0, _) => name.push_str("---"),
        (_, Some(i)) => {
            name.push_str(NAMES[i % 12]);
            name.push(char::from(b'1' + (i / 12) as u8));
        }
        (_, None) => name.push_str("???"),
    }
    name
}
