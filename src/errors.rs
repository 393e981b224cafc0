// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::obex::opcode::ResponseCode;

/// Error kinds raised by the PBAP layers.
///
/// Every kind maps to exactly one OBEX response code; the transaction
/// engine performs that mapping at the per-request boundary, so a failed
/// request never tears the session down. The only exception is
/// [`PbapError::Transport`], which is fatal for the current session and
/// makes the outer service loop re-enter its accept state.
#[derive(Debug, Error)]
pub enum PbapError {
    #[error("malformed application parameters: {0}")]
    MalformedParams(String),

    #[error("unknown object type: {0:?}")]
    UnknownObjectType(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("path already exists: {0}")]
    PathExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("operation forbidden")]
    Forbidden,

    #[error("unsupported vcard version: {0}")]
    UnsupportedVersion(String),

    #[error("empty vcard input")]
    EmptyInput,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("storage backend failure: {0}")]
    Storage(String),
}

impl PbapError {
    /// OBEX response code this error maps to when it crosses the
    /// per-request boundary of the transaction engine.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::MalformedParams(_)
            | Self::UnknownObjectType(_)
            | Self::UnsupportedVersion(_)
            | Self::EmptyInput
            | Self::InvalidArguments(_) => ResponseCode::BadRequest,
            Self::PathNotFound(_) | Self::NotADirectory(_) | Self::NotAFile(_) => {
                ResponseCode::NotFound
            },
            Self::PathExists(_) => ResponseCode::PreconditionFailed,
            Self::Forbidden => ResponseCode::Forbidden,
            Self::Transport(_) | Self::Storage(_) => ResponseCode::ServiceUnavailable,
        }
    }

    /// True when the session cannot continue after this error.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
