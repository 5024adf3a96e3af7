//! Format support for the modrender tracker player.
//!
//! Parses 31-sample 4-channel MOD files into [`mr_ir::Module`] and writes
//! them back out for the authoring path.

mod authoring;
mod mod_format;
mod records;

pub use authoring::{blank_module, save_mod};
pub use mod_format::load_mod;

/// Error type for format parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Signature at offset 1080 is not one of the supported layouts
    #[error("unsupported module format \"{}\"", .0.escape_ascii())]
    UnsupportedFormat([u8; 4]),
    /// A header, pattern or sample extends past the end of the buffer
    #[error("truncated file: need {needed} bytes, have {len}")]
    TruncatedFile { needed: usize, len: usize },
}
