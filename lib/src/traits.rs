// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use zeroize::Zeroizing;

use super::*;

/// Capabilities shared by every object backed by a native handle.
pub trait NativeObject {
    /// Algorithm name reported to the service layer.
    fn algorithm(&self) -> &str;

    /// Current native handle
    ///
    /// # Error
    /// * `NativeKeyError::InvalidState` - The handle has been released
    fn native_handle(&self) -> NativeKeyResult<NativeHandle>;

    /// Context the handle is scoped to.
    fn context(&self) -> &Context;

    /// Releases the native handle
    ///
    /// Idempotent: the first call clears the handle and deletes the native
    /// object, later calls do nothing. Dropping the object releases it too.
    /// A failed delete is logged and never reported; the handle stays cleared.
    fn release_handle(&self);

    /// Returns `true` once the handle has been released.
    fn is_released(&self) -> bool {
        self.native_handle().is_err()
    }
}

/// Key objects exposing their encoded material.
///
/// Both getters reach the engine at most once per object and return a fresh
/// copy on every call. `Ok(None)` means the value does not exist for this key.
pub trait AsymmetricKey: NativeObject {
    /// Encoded private key
    ///
    /// # Error
    /// * `NativeKeyError::InvalidState` - The handle has been released
    /// * `NativeKeyError::EngineFailure` - The engine failed to export the key
    fn private_encoding(&self) -> NativeKeyResult<Option<Zeroizing<Vec<u8>>>>;

    /// Encoded public key
    ///
    /// # Error
    /// * `NativeKeyError::InvalidState` - The handle has been released
    /// * `NativeKeyError::EngineFailure` - The engine failed to export the key
    fn public_encoding(&self) -> NativeKeyResult<Option<Vec<u8>>>;
}
