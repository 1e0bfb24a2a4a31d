// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

use super::*;

/// Native key object error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeKeyError {
    /// A required parameter is empty or otherwise unusable.
    ///
    /// Always raised before any native call is attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The object's handle is the sentinel (released or never created).
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The native engine reported a failure or returned an invalid handle.
    #[error("engine failure: {0}")]
    EngineFailure(#[from] EngineError),
}

impl NativeKeyError {
    /// Returns the underlying engine error, if any.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            NativeKeyError::EngineFailure(err) => Some(err),
            _ => None,
        }
    }
}

/// Checks that a handle returned by a creation call is usable.
///
/// A zero handle is a failure even when the engine reported success.
pub(crate) fn validate_created(handle: NativeHandle) -> NativeKeyResult<NativeHandle> {
    if handle.is_valid() {
        Ok(handle)
    } else {
        tracing::error!("Engine returned the sentinel handle from a creation call");
        Err(EngineError::NullHandle.into())
    }
}
