// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(dead_code)]

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use nativekey::*;
use nativekey_engine_sim::SimEngine;

/// Number of engine calls per operation.
#[derive(Debug, Default)]
pub struct Counters {
    pub create_key_pair: AtomicUsize,
    pub create_from_private_bytes: AtomicUsize,
    pub create_from_public_bytes: AtomicUsize,
    pub derive_shared_secret: AtomicUsize,
    pub get_private_material: AtomicUsize,
    pub get_public_material: AtomicUsize,
    pub delete_handle: AtomicUsize,
    pub create_random_stream: AtomicUsize,
    pub fill_random_bytes: AtomicUsize,
    pub reseed_random_stream: AtomicUsize,
    pub delete_random_stream: AtomicUsize,
    pub close_context: AtomicUsize,
}

impl Counters {
    pub fn total(&self) -> usize {
        [
            &self.create_key_pair,
            &self.create_from_private_bytes,
            &self.create_from_public_bytes,
            &self.derive_shared_secret,
            &self.get_private_material,
            &self.get_public_material,
            &self.delete_handle,
            &self.create_random_stream,
            &self.fill_random_bytes,
            &self.reseed_random_stream,
            &self.delete_random_stream,
            &self.close_context,
        ]
        .iter()
        .map(|counter| count(counter))
        .sum()
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Simulator wrapper that counts calls and injects faults.
#[derive(Debug, Default)]
pub struct CountingEngine {
    inner: SimEngine,
    pub calls: Counters,
    null_handles: AtomicBool,
    fail_deletes: AtomicBool,
    material_delay_ms: AtomicU64,
}

impl CountingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creation calls return the sentinel handle without an error.
    pub fn return_null_handles(&self, enabled: bool) {
        self.null_handles.store(enabled, Ordering::SeqCst);
    }

    /// Delete calls fail without touching the table.
    pub fn fail_deletes(&self, enabled: bool) {
        self.fail_deletes.store(enabled, Ordering::SeqCst);
    }

    /// Stalls material fetches to widen race windows.
    pub fn delay_material(&self, delay: Duration) {
        self.material_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn live_handles(&self, ctx: NativeHandle) -> usize {
        self.inner.live_handles(ctx)
    }

    fn stall(&self) {
        let delay = self.material_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
    }

    fn delete_fault(&self) -> EngineResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            Err(EngineError::Native("injected delete failure".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl Engine for CountingEngine {
    fn name(&self) -> &str {
        "counting-sim"
    }

    fn open_context(&self, fips: bool) -> EngineResult<NativeHandle> {
        self.inner.open_context(fips)
    }

    fn close_context(&self, ctx: NativeHandle) -> EngineResult<()> {
        bump(&self.calls.close_context);
        self.inner.close_context(ctx)
    }

    fn create_key_pair(&self, ctx: NativeHandle, curve: XecCurve) -> EngineResult<NativeHandle> {
        bump(&self.calls.create_key_pair);
        if self.null_handles.load(Ordering::SeqCst) {
            return Ok(NativeHandle::INVALID);
        }
        self.inner.create_key_pair(ctx, curve)
    }

    fn create_from_private_bytes(
        &self,
        ctx: NativeHandle,
        encoded: &[u8],
    ) -> EngineResult<NativeHandle> {
        bump(&self.calls.create_from_private_bytes);
        if self.null_handles.load(Ordering::SeqCst) {
            return Ok(NativeHandle::INVALID);
        }
        self.inner.create_from_private_bytes(ctx, encoded)
    }

    fn create_from_public_bytes(
        &self,
        ctx: NativeHandle,
        encoded: &[u8],
    ) -> EngineResult<NativeHandle> {
        bump(&self.calls.create_from_public_bytes);
        if self.null_handles.load(Ordering::SeqCst) {
            return Ok(NativeHandle::INVALID);
        }
        self.inner.create_from_public_bytes(ctx, encoded)
    }

    fn derive_shared_secret(
        &self,
        ctx: NativeHandle,
        public_key: NativeHandle,
        private_key: NativeHandle,
        secret_len: usize,
    ) -> EngineResult<Vec<u8>> {
        bump(&self.calls.derive_shared_secret);
        self.inner
            .derive_shared_secret(ctx, public_key, private_key, secret_len)
    }

    fn get_private_material(
        &self,
        ctx: NativeHandle,
        key: NativeHandle,
    ) -> EngineResult<Option<Vec<u8>>> {
        bump(&self.calls.get_private_material);
        self.stall();
        self.inner.get_private_material(ctx, key)
    }

    fn get_public_material(
        &self,
        ctx: NativeHandle,
        key: NativeHandle,
    ) -> EngineResult<Option<Vec<u8>>> {
        bump(&self.calls.get_public_material);
        self.stall();
        self.inner.get_public_material(ctx, key)
    }

    fn delete_handle(&self, ctx: NativeHandle, key: NativeHandle) -> EngineResult<()> {
        bump(&self.calls.delete_handle);
        self.delete_fault()?;
        self.inner.delete_handle(ctx, key)
    }

    fn create_random_stream(
        &self,
        ctx: NativeHandle,
        algorithm: &str,
    ) -> EngineResult<NativeHandle> {
        bump(&self.calls.create_random_stream);
        if self.null_handles.load(Ordering::SeqCst) {
            return Ok(NativeHandle::INVALID);
        }
        self.inner.create_random_stream(ctx, algorithm)
    }

    fn fill_random_bytes(
        &self,
        ctx: NativeHandle,
        stream: NativeHandle,
        buf: &mut [u8],
    ) -> EngineResult<()> {
        bump(&self.calls.fill_random_bytes);
        self.inner.fill_random_bytes(ctx, stream, buf)
    }

    fn reseed_random_stream(
        &self,
        ctx: NativeHandle,
        stream: NativeHandle,
        seed: &[u8],
    ) -> EngineResult<()> {
        bump(&self.calls.reseed_random_stream);
        self.inner.reseed_random_stream(ctx, stream, seed)
    }

    fn delete_random_stream(&self, ctx: NativeHandle, stream: NativeHandle) -> EngineResult<()> {
        bump(&self.calls.delete_random_stream);
        self.delete_fault()?;
        self.inner.delete_random_stream(ctx, stream)
    }
}

/// Test fixture: a counting engine, a context on it, and a private reclaimer.
pub struct Fixture {
    pub engine: Arc<CountingEngine>,
    pub context: Context,
    pub reclaimer: Reclaimer,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_fips(false)
    }

    pub fn with_fips(fips: bool) -> Self {
        let engine = CountingEngine::new();
        let reclaimer = Reclaimer::new();
        let context = Context::open_with_reclaimer(engine.clone(), fips, reclaimer.clone())
            .expect("Failed to open context");
        Self {
            engine,
            context,
            reclaimer,
        }
    }

    pub fn live_handles(&self) -> usize {
        self.engine.live_handles(self.context.id())
    }
}
