/* This file is part of the TubeScribe project - https://github.com/tubescribe/tubescribe
*
*  Copyright (C) 2025 TubeScribe contributors
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
use std::fmt::{Debug, Display};
use std::sync::Arc;

use cloneable_errors::ErrorContext;

/// Discriminant for [`Error`]. Every failure is terminal for the current
/// request - nothing in this crate retries automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BootstrapFailed,
    ProtocolError,
    AttestationUnavailable,
    VideoNotFound,
    NoCaptionsFound,
    TranscriptUnavailable,
    ValidationError,
}

/// `Clone` is required: session build results are distributed to concurrent
/// callers through a shared future.
#[derive(Clone)]
pub enum Error {
    /// No visitor identity could be obtained during session bootstrap.
    BootstrapFailed(ErrorContext),
    /// The challenge or integrity token exchange returned an unexpected shape.
    Protocol(ErrorContext),
    /// The attestation interpreter is missing, or the program could not be run.
    AttestationUnavailable(ErrorContext),
    /// The platform returned no usable info for this video.
    VideoNotFound { video_id: Arc<str>, context: ErrorContext },
    /// The video has no caption tracks at all.
    NoCaptionsFound { video_id: Arc<str> },
    /// The captions payload was a placeholder or could not be retrieved.
    TranscriptUnavailable { video_id: Arc<str>, context: ErrorContext },
    /// A mandatory metadata field was missing from the video info.
    Validation { video_id: Arc<str>, field: &'static str },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BootstrapFailed(..) => ErrorKind::BootstrapFailed,
            Error::Protocol(..) => ErrorKind::ProtocolError,
            Error::AttestationUnavailable(..) => ErrorKind::AttestationUnavailable,
            Error::VideoNotFound { .. } => ErrorKind::VideoNotFound,
            Error::NoCaptionsFound { .. } => ErrorKind::NoCaptionsFound,
            Error::TranscriptUnavailable { .. } => ErrorKind::TranscriptUnavailable,
            Error::Validation { .. } => ErrorKind::ValidationError,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BootstrapFailed(err) => write!(f, "session bootstrap failed: {err}"),
            Error::Protocol(err) => write!(f, "attestation protocol error: {err}"),
            Error::AttestationUnavailable(err) => write!(f, "attestation unavailable: {err}"),
            Error::VideoNotFound { video_id, context } => write!(f, "no usable video info for {video_id}: {context}"),
            Error::NoCaptionsFound { video_id } => write!(f, "video {video_id} has no caption tracks"),
            Error::TranscriptUnavailable { video_id, context } => write!(f, "transcript unavailable for {video_id}: {context}"),
            Error::Validation { video_id, field } => write!(f, "video {video_id} is missing the mandatory '{field}' field"),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BootstrapFailed(err) | Error::Protocol(err) | Error::AttestationUnavailable(err) => Debug::fmt(err, f),
            Error::VideoNotFound { context, .. } | Error::TranscriptUnavailable { context, .. } => Debug::fmt(context, f),
            Error::NoCaptionsFound { .. } | Error::Validation { .. } => Display::fmt(self, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::BootstrapFailed(err) | Error::Protocol(err) | Error::AttestationUnavailable(err) => Some(err),
            Error::VideoNotFound { context, .. } | Error::TranscriptUnavailable { context, .. } => Some(context),
            Error::NoCaptionsFound { .. } | Error::Validation { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
