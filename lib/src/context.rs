// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use super::*;

struct ContextInner {
    engine: Arc<dyn Engine>,
    id: NativeHandle,
    fips: bool,
    reclaimer: Reclaimer,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        match self.engine.close_context(self.id) {
            Ok(()) => tracing::debug!(ctx = ?self.id, "Closed context"),
            Err(err) => tracing::error!(ctx = ?self.id, ?err, "Failed to close context"),
        }
    }
}

/// One initialized session of a native engine.
///
/// Immutable once opened and shared by every object created under it. The
/// native context is closed when the last clone (including the ones held by
/// key and stream objects) is dropped.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Opens a context whose objects are reclaimed by [`Reclaimer::global`].
    pub fn open(engine: Arc<dyn Engine>, fips: bool) -> NativeKeyResult<Self> {
        Self::open_with_reclaimer(engine, fips, Reclaimer::global().clone())
    }

    /// Opens a context whose objects are reclaimed by `reclaimer`.
    #[tracing::instrument(skip(engine, reclaimer), fields(engine_name = engine.name()))]
    pub fn open_with_reclaimer(
        engine: Arc<dyn Engine>,
        fips: bool,
        reclaimer: Reclaimer,
    ) -> NativeKeyResult<Self> {
        let id = validate_created(engine.open_context(fips)?)?;
        tracing::debug!(ctx = ?id, "Opened context");

        Ok(Self {
            inner: Arc::new(ContextInner {
                engine,
                id,
                fips,
                reclaimer,
            }),
        })
    }

    /// Native context handle passed to every engine call.
    pub fn id(&self) -> NativeHandle {
        self.inner.id
    }

    /// Returns `true` for a FIPS-mode session.
    pub fn is_fips(&self) -> bool {
        self.inner.fips
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.inner.engine.as_ref()
    }

    pub(crate) fn reclaimer(&self) -> &Reclaimer {
        &self.inner.reclaimer
    }

    /// Returns `true` if both values refer to the same session.
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("engine", &self.inner.engine.name())
            .field("id", &self.inner.id)
            .field("fips", &self.inner.fips)
            .finish()
    }
}
