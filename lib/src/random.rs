// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand_core::CryptoRng;
use rand_core::RngCore;

use super::*;

fn release_stream(context: &Context, handle: &Mutex<NativeHandle>) {
    let handle = std::mem::take(&mut *handle.lock());
    if !handle.is_valid() {
        return;
    }

    tracing::debug!(ctx = ?context.id(), ?handle, "Releasing random stream");
    if let Err(err) = context.engine().delete_random_stream(context.id(), handle) {
        tracing::warn!(ctx = ?context.id(), ?handle, ?err, "Failed to delete random stream");
    }
}

/// Native PRNG stream.
///
/// Every fill and reseed on one stream is serialized by the stream's own
/// lock; separate streams never contend. Output is never cached.
pub struct RandomStream {
    context: Context,
    algorithm: String,
    handle: Arc<Mutex<NativeHandle>>,
    _registration: Registration,
}

impl RandomStream {
    /// Creates a PRNG stream
    ///
    /// # Arguments
    /// * `context`   - Context to create the stream under
    /// * `algorithm` - Engine PRNG algorithm name, e.g. `"SHA256DRBG"`
    ///
    /// # Returns
    /// * `RandomStream` - New stream
    ///
    /// # Error
    /// * `NativeKeyError::InvalidArgument` - `algorithm` is empty
    /// * `NativeKeyError::EngineFailure`   - The engine failed or returned the sentinel handle
    #[tracing::instrument(skip(context), fields(ctx = ?context.id()))]
    pub fn create(context: &Context, algorithm: &str) -> NativeKeyResult<Self> {
        let algorithm = algorithm.trim();
        if algorithm.is_empty() {
            Err(NativeKeyError::InvalidArgument("PRNG algorithm name is empty"))?;
        }

        let handle = context
            .engine()
            .create_random_stream(context.id(), algorithm)?;
        let handle = validate_created(handle)?;
        let handle = Arc::new(Mutex::new(handle));

        let registration = {
            let reclaimer = context.reclaimer();
            let context = context.clone();
            let handle = handle.clone();
            reclaimer.register(move || release_stream(&context, &handle))
        };

        Ok(Self {
            context: context.clone(),
            algorithm: algorithm.to_owned(),
            handle,
            _registration: registration,
        })
    }

    /// Fills `buf` with output of the stream.
    ///
    /// A zero-length buffer never reaches the engine.
    pub fn next_bytes(&self, buf: &mut [u8]) -> NativeKeyResult<()> {
        let handle = self.handle.lock();
        let stream = live_handle(*handle)?;
        if buf.is_empty() {
            return Ok(());
        }

        self.context
            .engine()
            .fill_random_bytes(self.context.id(), stream, buf)?;
        Ok(())
    }

    /// Mixes `seed` into the stream state.
    ///
    /// A zero-length seed never reaches the engine.
    pub fn reseed(&self, seed: &[u8]) -> NativeKeyResult<()> {
        let handle = self.handle.lock();
        let stream = live_handle(*handle)?;
        if seed.is_empty() {
            return Ok(());
        }

        self.context
            .engine()
            .reseed_random_stream(self.context.id(), stream, seed)?;
        Ok(())
    }
}

fn live_handle(handle: NativeHandle) -> NativeKeyResult<NativeHandle> {
    if handle.is_valid() {
        Ok(handle)
    } else {
        Err(NativeKeyError::InvalidState(
            "random stream handle has been released",
        ))
    }
}

impl NativeObject for RandomStream {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn native_handle(&self) -> NativeKeyResult<NativeHandle> {
        live_handle(*self.handle.lock())
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn release_handle(&self) {
        release_stream(&self.context, &self.handle)
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        // RngCore::fill_bytes has no error channel.
        if let Err(err) = self.next_bytes(dest) {
            panic!("native random stream failed: {err}");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.next_bytes(dest).map_err(rand_core::Error::new)
    }
}

impl CryptoRng for RandomStream {}

impl fmt::Debug for RandomStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomStream")
            .field("ctx", &self.context.id())
            .field("algorithm", &self.algorithm)
            .field("handle", &*self.handle.lock())
            .finish()
    }
}
