use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

use crate::marker::Marker;

/// Coarse classification of a [`CodestreamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Marker payload length inconsistent with its record layout.
    Structural,
    /// Marker illegal for the current state, or an unresolvable unknown marker.
    Protocol,
    /// Short read or other failure of the underlying byte stream.
    Stream,
    /// Growing an accumulation buffer failed.
    ResourceExhausted,
    /// Out-of-range component, impossible resolution reduction, conflicting
    /// tile-part counts and similar value-level inconsistencies.
    Semantic,
    /// The external tile-coding engine reported a failure.
    TileCoding,
}

#[derive(Debug, Error)]
pub enum CodestreamError {
    #[error("{marker} marker segment is malformed: {reason}")]
    Malformed { marker: Marker, reason: String },

    #[error("{marker} marker segment has invalid length {length}")]
    InvalidLength { marker: Marker, length: u16 },

    #[error("marker 0x{id:04X} is not compliant with its position at byte offset {offset}")]
    MarkerPosition { id: u16, offset: u64 },

    #[error("expected a marker id (0xFF--), found 0x{id:04X} at byte offset {offset}")]
    NotAMarker { id: u16, offset: u64 },

    #[error("expected {expected} marker, found 0x{found:04X} at byte offset {offset}")]
    MarkerExpected {
        expected: Marker,
        found: u16,
        offset: u64,
    },

    #[error("required {marker} marker not found")]
    MarkerMissing { marker: Marker },

    #[error("unknown marker at byte offset {offset}: no known marker within {scanned} bytes")]
    UnknownMarker { offset: u64, scanned: u64 },

    #[error("{0}")]
    InvalidOperation(&'static str),

    #[error("{marker} marker segment: {reason}")]
    Semantic { marker: Marker, reason: String },

    #[error("invalid decode region: {reason}")]
    InvalidRegion { reason: String },

    #[error("invalid coding parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("stream error: {0}")]
    Stream(#[from] io::Error),

    #[error("allocation of {what} failed")]
    ResourceExhausted {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    #[error("tile {tile} could not be coded: {reason}")]
    TileCoding { tile: u32, reason: String },

    #[error("codec halted after an earlier {0:?} error")]
    Halted(ErrorKind),
}

impl CodestreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed { .. } | Self::InvalidLength { .. } => ErrorKind::Structural,
            Self::MarkerPosition { .. }
            | Self::NotAMarker { .. }
            | Self::MarkerExpected { .. }
            | Self::MarkerMissing { .. }
            | Self::UnknownMarker { .. }
            | Self::InvalidOperation(_) => ErrorKind::Protocol,
            Self::Semantic { .. } | Self::InvalidRegion { .. } | Self::InvalidParameters { .. } => {
                ErrorKind::Semantic
            }
            Self::Stream(_) => ErrorKind::Stream,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::TileCoding { .. } => ErrorKind::TileCoding,
            Self::Halted(kind) => *kind,
        }
    }

    pub(crate) fn malformed(marker: Marker, reason: impl Into<String>) -> Self {
        Self::Malformed {
            marker,
            reason: reason.into(),
        }
    }

    pub(crate) fn semantic(marker: Marker, reason: impl Into<String>) -> Self {
        Self::Semantic {
            marker,
            reason: reason.into(),
        }
    }

    pub(crate) fn exhausted(what: &'static str) -> impl FnOnce(TryReserveError) -> Self {
        move |source| Self::ResourceExhausted { what, source }
    }
}

pub type Result<T> = std::result::Result<T, CodestreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = CodestreamError::malformed(Marker::Cod, "trailing bytes");
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(
            err.to_string(),
            "COD marker segment is malformed: trailing bytes"
        );

        let err: CodestreamError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert_eq!(err.kind(), ErrorKind::Stream);

        let err = CodestreamError::MarkerPosition {
            id: 0xFF51,
            offset: 12,
        };
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(
            err.to_string(),
            "marker 0xFF51 is not compliant with its position at byte offset 12"
        );

        assert_eq!(
            CodestreamError::Halted(ErrorKind::Semantic).kind(),
            ErrorKind::Semantic
        );
    }
}
