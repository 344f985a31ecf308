use std::io;
use thiserror::Error;

use crate::audio::sink::SinkError;
use crate::protocol::rtp::packet::RtpDecodeError;

/// Errors that can occur in the playback core
#[derive(Debug, Error)]
pub enum RaopAudioError {
    /// Audio sink error
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// RTP message decoding failed
    #[error("RTP decode error: {0}")]
    Decode(#[from] RtpDecodeError),

    /// Network or thread I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RaopAudioError {
    /// Check if the operation can be retried
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Sink(SinkError::WriteFailed(_))
        )
    }
}

/// Result type alias for playback-core operations
pub type Result<T> = std::result::Result<T, RaopAudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RaopAudioError::Sink(SinkError::DeviceLost("unplugged".to_string()));
        assert_eq!(err.to_string(), "sink error: audio device lost: unplugged");
    }

    #[test]
    fn test_error_is_recoverable() {
        let transient = RaopAudioError::Sink(SinkError::WriteFailed("busy".to_string()));
        assert!(transient.is_recoverable());

        let fatal = RaopAudioError::Sink(SinkError::DeviceLost("gone".to_string()));
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err: RaopAudioError = io_err.into();

        assert!(matches!(err, RaopAudioError::Io(_)));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RaopAudioError>();
    }
}
