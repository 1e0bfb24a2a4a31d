// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![warn(missing_docs)]

//! Software native engine
//!
//! A simulator for the native cryptographic engine. Objects live in a handle
//! table keyed by non-zero handles; keys are OpenSSL XDH keys and PRNG streams
//! are seeded from the operating system. Intended for tests and for running
//! the `nativekey` object model without a hardware-backed engine.

mod handle_table;
mod prng;
mod xec;

use std::fmt::Debug;

use handle_table::HandleTable;
use handle_table::HandleType;
use handle_table::SimObject;
pub use nativekey_engine_interface::*;
use parking_lot::Mutex;
use tracing::instrument;

use crate::prng::SimStream;
use crate::prng::StreamAlgo;
use crate::xec::SimXecKey;

pub(crate) trait EngineErrorMapper<T> {
    fn map_engine_err(self, engine_err: EngineError) -> EngineResult<T>;
}

impl<T, E: Debug> EngineErrorMapper<T> for Result<T, E> {
    fn map_engine_err(self, engine_err: EngineError) -> EngineResult<T> {
        match self {
            Ok(t) => Ok(t),
            Err(err) => {
                tracing::error!("Mapping error {:?} to engine error: {:?}", err, engine_err);
                Err(engine_err)
            }
        }
    }
}

pub(crate) fn native_err(err: openssl::error::ErrorStack) -> EngineError {
    tracing::error!(error = ?err, "OpenSSL failure");
    EngineError::Native(err.to_string())
}

/// Native engine simulator
#[derive(Default)]
pub struct SimEngine {
    table: HandleTable,
}

impl SimEngine {
    /// Creates an empty simulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live key and stream handles owned by `ctx`.
    pub fn live_handles(&self, ctx: NativeHandle) -> usize {
        self.table.owned_by(ctx)
    }
}

impl Debug for SimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEngine").finish_non_exhaustive()
    }
}

impl Engine for SimEngine {
    fn name(&self) -> &str {
        "sim"
    }

    #[instrument(skip(self))]
    fn open_context(&self, fips: bool) -> EngineResult<NativeHandle> {
        let ctx = self
            .table
            .alloc_handle(NativeHandle::INVALID, SimObject::Context { fips });
        tracing::debug!(%ctx, "Opened context");
        Ok(ctx)
    }

    #[instrument(skip(self), fields(%ctx))]
    fn close_context(&self, ctx: NativeHandle) -> EngineResult<()> {
        let orphans = self.table.free_context(ctx)?;
        if orphans > 0 {
            tracing::warn!(orphans, "Context closed with live handles");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(%ctx))]
    fn create_key_pair(&self, ctx: NativeHandle, curve: XecCurve) -> EngineResult<NativeHandle> {
        self.table.context_fips(ctx)?;
        let key = SimXecKey::generate(curve)?;
        Ok(self
            .table
            .alloc_handle(ctx, SimObject::XecKey(std::sync::Arc::new(key))))
    }

    #[instrument(skip_all, fields(%ctx, len = encoded.len()))]
    fn create_from_private_bytes(
        &self,
        ctx: NativeHandle,
        encoded: &[u8],
    ) -> EngineResult<NativeHandle> {
        self.table.context_fips(ctx)?;
        let key = SimXecKey::from_private_der(encoded)?;
        Ok(self
            .table
            .alloc_handle(ctx, SimObject::XecKey(std::sync::Arc::new(key))))
    }

    #[instrument(skip_all, fields(%ctx, len = encoded.len()))]
    fn create_from_public_bytes(
        &self,
        ctx: NativeHandle,
        encoded: &[u8],
    ) -> EngineResult<NativeHandle> {
        self.table.context_fips(ctx)?;
        let key = SimXecKey::from_public_der(encoded)?;
        Ok(self
            .table
            .alloc_handle(ctx, SimObject::XecKey(std::sync::Arc::new(key))))
    }

    fn derive_shared_secret(
        &self,
        ctx: NativeHandle,
        public_key: NativeHandle,
        private_key: NativeHandle,
        secret_len: usize,
    ) -> EngineResult<Vec<u8>> {
        let peer = self.table.xec_key(ctx, public_key)?;
        let local = self.table.xec_key(ctx, private_key)?;
        local.derive(&peer, secret_len)
    }

    fn get_private_material(
        &self,
        ctx: NativeHandle,
        key: NativeHandle,
    ) -> EngineResult<Option<Vec<u8>>> {
        self.table.xec_key(ctx, key)?.private_der()
    }

    fn get_public_material(
        &self,
        ctx: NativeHandle,
        key: NativeHandle,
    ) -> EngineResult<Option<Vec<u8>>> {
        self.table.xec_key(ctx, key)?.public_der()
    }

    fn delete_handle(&self, ctx: NativeHandle, key: NativeHandle) -> EngineResult<()> {
        self.table.free_handle(ctx, key, HandleType::XecKey)?;
        tracing::trace!(%ctx, %key, "Deleted key");
        Ok(())
    }

    #[instrument(skip(self), fields(%ctx))]
    fn create_random_stream(
        &self,
        ctx: NativeHandle,
        algorithm: &str,
    ) -> EngineResult<NativeHandle> {
        let fips = self.table.context_fips(ctx)?;
        let algo = StreamAlgo::from_name(algorithm)?;
        if fips && !algo.fips_approved() {
            tracing::error!(?algo, "PRNG algorithm not approved for FIPS context");
            Err(EngineError::NotPermittedInFips(algorithm.to_owned()))?;
        }

        let stream = SimStream::new(algo)?;
        Ok(self.table.alloc_handle(
            ctx,
            SimObject::RandomStream(std::sync::Arc::new(Mutex::new(stream))),
        ))
    }

    fn fill_random_bytes(
        &self,
        ctx: NativeHandle,
        stream: NativeHandle,
        buf: &mut [u8],
    ) -> EngineResult<()> {
        let stream = self.table.random_stream(ctx, stream)?;
        stream.lock().fill(buf);
        Ok(())
    }

    fn reseed_random_stream(
        &self,
        ctx: NativeHandle,
        stream: NativeHandle,
        seed: &[u8],
    ) -> EngineResult<()> {
        let stream = self.table.random_stream(ctx, stream)?;
        stream.lock().reseed(seed);
        Ok(())
    }

    fn delete_random_stream(&self, ctx: NativeHandle, stream: NativeHandle) -> EngineResult<()> {
        if let SimObject::RandomStream(stream) =
            self.table
                .free_handle(ctx, stream, HandleType::RandomStream)?
        {
            tracing::trace!(%ctx, algo = ?stream.lock().algo(), "Deleted random stream");
        }
        Ok(())
    }
}
