// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use zeroize::Zeroizing;

use super::*;

const XDH_ALGORITHM: &str = "XDH";

/// Lazily fetched encoded material.
enum Material<T> {
    Unfetched,
    Absent,
    Present(T),
}

impl<T: Clone> Material<T> {
    fn copied(&self) -> Option<T> {
        match self {
            Material::Present(bytes) => Some(bytes.clone()),
            Material::Unfetched | Material::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for Material<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(bytes) => Material::Present(bytes),
            None => Material::Absent,
        }
    }
}

struct XecKeyState {
    handle: NativeHandle,
    private: Material<Zeroizing<Vec<u8>>>,
    public: Material<Vec<u8>>,
}

impl XecKeyState {
    fn live_handle(&self) -> NativeKeyResult<NativeHandle> {
        if self.handle.is_valid() {
            Ok(self.handle)
        } else {
            Err(NativeKeyError::InvalidState("key handle has been released"))
        }
    }
}

fn release_key(context: &Context, state: &Mutex<XecKeyState>) {
    let handle = {
        let mut state = state.lock();
        // Zeroizing wipes the private bytes in place as the cache entry drops.
        state.private = Material::Unfetched;
        state.public = Material::Unfetched;
        std::mem::take(&mut state.handle)
    };

    if !handle.is_valid() {
        return;
    }

    tracing::debug!(ctx = ?context.id(), ?handle, "Releasing XDH key");
    if let Err(err) = context.engine().delete_handle(context.id(), handle) {
        tracing::warn!(ctx = ?context.id(), ?handle, ?err, "Failed to delete XDH key");
    }
}

/// XDH (X25519 / X448) key backed by a native engine handle.
///
/// The object owns exactly one native key. Encoded private and public
/// material is fetched from the engine on first request and cached; the
/// cached private bytes are wiped when the handle is released. Dropping the
/// key queues its release on the context's [`Reclaimer`].
pub struct XecKey {
    context: Context,
    curve: Option<XecCurve>,
    state: Arc<Mutex<XecKeyState>>,
    _registration: Registration,
}

impl XecKey {
    /// Generates a new key pair
    ///
    /// # Arguments
    /// * `context` - Context to create the key under
    /// * `curve`   - Curve to generate on
    ///
    /// # Returns
    /// * `XecKey` - Key with no cached material
    ///
    /// # Error
    /// * `NativeKeyError::EngineFailure` - The engine failed or returned the sentinel handle
    #[tracing::instrument(skip_all, fields(ctx = ?context.id(), %curve))]
    pub fn generate_key_pair(context: &Context, curve: XecCurve) -> NativeKeyResult<Self> {
        let handle = context.engine().create_key_pair(context.id(), curve)?;
        Self::wrap(context, handle, Some(curve))
    }

    /// Generates a new key pair on the curve named `curve_name`
    ///
    /// Accepts `"X25519"` and `"X448"` in any case.
    ///
    /// # Error
    /// * `NativeKeyError::InvalidArgument` - The name is empty or not a supported curve
    pub fn generate_key_pair_named(context: &Context, curve_name: &str) -> NativeKeyResult<Self> {
        let curve_name = curve_name.trim();
        if curve_name.is_empty() {
            Err(NativeKeyError::InvalidArgument("curve name is empty"))?;
        }

        let curve = curve_name
            .parse::<XecCurve>()
            .map_err(|_| NativeKeyError::InvalidArgument("unsupported curve name"))?;
        Self::generate_key_pair(context, curve)
    }

    /// Imports a key pair from its encoded private key
    ///
    /// The bytes are passed to the engine untouched.
    ///
    /// # Error
    /// * `NativeKeyError::InvalidArgument` - `encoded` is empty
    /// * `NativeKeyError::EngineFailure`   - The engine rejected the encoding
    #[tracing::instrument(skip_all, fields(ctx = ?context.id(), len = encoded.len()))]
    pub fn import_private(context: &Context, encoded: &[u8]) -> NativeKeyResult<Self> {
        if encoded.is_empty() {
            Err(NativeKeyError::InvalidArgument("private key encoding is empty"))?;
        }

        let handle = context
            .engine()
            .create_from_private_bytes(context.id(), encoded)?;
        Self::wrap(context, handle, None)
    }

    /// Imports a public-only key from its encoded public key
    ///
    /// # Error
    /// * `NativeKeyError::InvalidArgument` - `encoded` is empty
    /// * `NativeKeyError::EngineFailure`   - The engine rejected the encoding
    #[tracing::instrument(skip_all, fields(ctx = ?context.id(), len = encoded.len()))]
    pub fn import_public(context: &Context, encoded: &[u8]) -> NativeKeyResult<Self> {
        if encoded.is_empty() {
            Err(NativeKeyError::InvalidArgument("public key encoding is empty"))?;
        }

        let handle = context
            .engine()
            .create_from_public_bytes(context.id(), encoded)?;
        Self::wrap(context, handle, None)
    }

    fn wrap(
        context: &Context,
        handle: NativeHandle,
        curve: Option<XecCurve>,
    ) -> NativeKeyResult<Self> {
        // Nothing is registered for a failed creation.
        let handle = validate_created(handle)?;
        let state = Arc::new(Mutex::new(XecKeyState {
            handle,
            private: Material::Unfetched,
            public: Material::Unfetched,
        }));

        let registration = {
            let reclaimer = context.reclaimer();
            let context = context.clone();
            let state = state.clone();
            reclaimer.register(move || release_key(&context, &state))
        };

        tracing::debug!(ctx = ?context.id(), ?handle, "Created XDH key");
        Ok(Self {
            context: context.clone(),
            curve,
            state,
            _registration: registration,
        })
    }

    /// Curve the key was generated on; `None` for imported keys.
    pub fn curve(&self) -> Option<XecCurve> {
        self.curve
    }

    /// Computes an XDH shared secret
    ///
    /// # Arguments
    /// * `private`    - Local key holding the private half
    /// * `public`     - Peer key (only its public half is used)
    /// * `secret_len` - Expected secret length
    ///
    /// # Returns
    /// * `Zeroizing<Vec<u8>>` - Shared secret
    ///
    /// # Error
    /// * `NativeKeyError::InvalidArgument` - The keys belong to different contexts or `secret_len` is zero
    /// * `NativeKeyError::InvalidState`    - Either key has been released
    /// * `NativeKeyError::EngineFailure`   - The engine failed to derive the secret
    pub fn compute_shared_secret(
        private: &XecKey,
        public: &XecKey,
        secret_len: usize,
    ) -> NativeKeyResult<Zeroizing<Vec<u8>>> {
        if !private.context.same_as(&public.context) {
            Err(NativeKeyError::InvalidArgument(
                "keys belong to different contexts",
            ))?;
        }
        if secret_len == 0 {
            Err(NativeKeyError::InvalidArgument("secret length is zero"))?;
        }

        let (private_handle, public_handle, _guards) = lock_pair(&private.state, &public.state)?;
        let secret = private.context.engine().derive_shared_secret(
            private.context.id(),
            public_handle,
            private_handle,
            secret_len,
        )?;
        Ok(Zeroizing::new(secret))
    }
}

type PairGuards<'a> = (
    MutexGuard<'a, XecKeyState>,
    Option<MutexGuard<'a, XecKeyState>>,
);

/// Locks both keys in address order and returns their live handles.
fn lock_pair<'a>(
    private: &'a Arc<Mutex<XecKeyState>>,
    public: &'a Arc<Mutex<XecKeyState>>,
) -> NativeKeyResult<(NativeHandle, NativeHandle, PairGuards<'a>)> {
    if Arc::ptr_eq(private, public) {
        let guard = private.lock();
        let handle = guard.live_handle()?;
        return Ok((handle, handle, (guard, None)));
    }

    let (private_guard, public_guard) = if Arc::as_ptr(private) < Arc::as_ptr(public) {
        let private_guard = private.lock();
        (private_guard, public.lock())
    } else {
        let public_guard = public.lock();
        (private.lock(), public_guard)
    };

    let private_handle = private_guard.live_handle()?;
    let public_handle = public_guard.live_handle()?;
    Ok((
        private_handle,
        public_handle,
        (private_guard, Some(public_guard)),
    ))
}

impl NativeObject for XecKey {
    fn algorithm(&self) -> &str {
        XDH_ALGORITHM
    }

    fn native_handle(&self) -> NativeKeyResult<NativeHandle> {
        self.state.lock().live_handle()
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn release_handle(&self) {
        release_key(&self.context, &self.state)
    }
}

impl AsymmetricKey for XecKey {
    fn private_encoding(&self) -> NativeKeyResult<Option<Zeroizing<Vec<u8>>>> {
        let mut state = self.state.lock();
        let handle = state.live_handle()?;

        if let Material::Unfetched = state.private {
            let fetched = self
                .context
                .engine()
                .get_private_material(self.context.id(), handle)?;
            tracing::trace!(?handle, present = fetched.is_some(), "Fetched private material");
            state.private = fetched.map(Zeroizing::new).into();
        }

        Ok(state.private.copied())
    }

    fn public_encoding(&self) -> NativeKeyResult<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        let handle = state.live_handle()?;

        if let Material::Unfetched = state.public {
            let fetched = self
                .context
                .engine()
                .get_public_material(self.context.id(), handle)?;
            tracing::trace!(?handle, present = fetched.is_some(), "Fetched public material");
            state.public = fetched.into();
        }

        Ok(state.public.copied())
    }
}

impl fmt::Debug for XecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XecKey")
            .field("ctx", &self.context.id())
            .field("curve", &self.curve)
            .field("handle", &self.state.lock().handle)
            .finish()
    }
}
