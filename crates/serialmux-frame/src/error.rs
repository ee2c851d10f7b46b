/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The DLC is outside the 1..=32 range a frame can carry.
    #[error("invalid DLC {dlc} (must be 1..=32)")]
    InvalidDlc { dlc: usize },

    /// The buffer is shorter than the frame it claims to hold.
    #[error("truncated frame ({have} bytes, need {need})")]
    Truncated { have: usize, need: usize },

    /// The received checksum does not match the recomputed one.
    #[error("checksum mismatch (expected {expected:#04x}, found {found:#04x})")]
    ChecksumMismatch { expected: u8, found: u8 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
