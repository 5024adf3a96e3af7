//! On-disk header records.

use binrw::binrw;

/// One 30-byte sample record. Lengths are 16-bit word counts.
#[binrw]
#[brw(big)]
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RawSampleHeader {
    pub name: [u8; 22],
    pub length: u16,
    pub finetune: u8,
    pub volume: u8,
    pub loop_start: u16,
    pub loop_length: u16,
}

/// The fixed 1084-byte module header.
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub(crate) struct RawHeader {
    pub name: [u8; 20],
    pub samples: [RawSampleHeader; 31],
    pub song_length: u8,
    pub restart: u8,
    pub order: [u8; 128],
    pub signature: [u8; 4],
}
