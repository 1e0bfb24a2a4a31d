// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;

use super::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum HandleType {
    Context,
    XecKey,
    RandomStream,
}

pub(crate) enum SimObject {
    Context { fips: bool },
    XecKey(Arc<SimXecKey>),
    RandomStream(Arc<Mutex<SimStream>>),
}

impl SimObject {
    fn handle_type(&self) -> HandleType {
        match self {
            SimObject::Context { .. } => HandleType::Context,
            SimObject::XecKey(_) => HandleType::XecKey,
            SimObject::RandomStream(_) => HandleType::RandomStream,
        }
    }
}

struct Entry {
    /// Owning context; `NativeHandle::INVALID` for context entries.
    owner: NativeHandle,
    object: SimObject,
}

/// Handle table
#[derive(Default)]
pub(crate) struct HandleTable {
    table: RwLock<HandleTableInner>,
}

impl HandleTable {
    pub(crate) fn alloc_handle(&self, owner: NativeHandle, object: SimObject) -> NativeHandle {
        let mut table = self.table.write();
        table.alloc_handle(owner, object)
    }

    /// Returns the FIPS flag of a live context.
    pub(crate) fn context_fips(&self, ctx: NativeHandle) -> EngineResult<bool> {
        let table = self.table.read();
        table.context_fips(ctx)
    }

    pub(crate) fn xec_key(
        &self,
        ctx: NativeHandle,
        handle: NativeHandle,
    ) -> EngineResult<Arc<SimXecKey>> {
        let table = self.table.read();
        match &table.entry(ctx, handle, HandleType::XecKey)?.object {
            SimObject::XecKey(key) => Ok(key.clone()),
            _ => Err(EngineError::InvalidHandle),
        }
    }

    pub(crate) fn random_stream(
        &self,
        ctx: NativeHandle,
        handle: NativeHandle,
    ) -> EngineResult<Arc<Mutex<SimStream>>> {
        let table = self.table.read();
        match &table.entry(ctx, handle, HandleType::RandomStream)?.object {
            SimObject::RandomStream(stream) => Ok(stream.clone()),
            _ => Err(EngineError::InvalidHandle),
        }
    }

    pub(crate) fn free_handle(
        &self,
        ctx: NativeHandle,
        handle: NativeHandle,
        handle_type: HandleType,
    ) -> EngineResult<SimObject> {
        let mut table = self.table.write();
        table.entry(ctx, handle, handle_type)?;
        table
            .table
            .remove(&handle)
            .map(|entry| entry.object)
            .ok_or(EngineError::InvalidHandle)
    }

    /// Removes a context and every handle it still owns.
    ///
    /// # Returns
    /// * `usize` - Number of owned handles that had not been deleted
    pub(crate) fn free_context(&self, ctx: NativeHandle) -> EngineResult<usize> {
        let mut table = self.table.write();
        table.context_fips(ctx)?;
        table.table.remove(&ctx);

        let before = table.table.len();
        table.table.retain(|_, entry| entry.owner != ctx);
        Ok(before - table.table.len())
    }

    /// Number of live handles owned by `ctx`.
    pub(crate) fn owned_by(&self, ctx: NativeHandle) -> usize {
        let table = self.table.read();
        table
            .table
            .values()
            .filter(|entry| entry.owner == ctx)
            .count()
    }
}

#[derive(Default)]
struct HandleTableInner {
    table: HashMap<NativeHandle, Entry>,
    id_counter: u64,
}

impl HandleTableInner {
    fn alloc_handle(&mut self, owner: NativeHandle, object: SimObject) -> NativeHandle {
        loop {
            self.id_counter = self.id_counter.wrapping_add(1);
            let id = NativeHandle::new(self.id_counter);
            if id.is_valid() && !self.table.contains_key(&id) {
                self.table.insert(id, Entry { owner, object });
                return id;
            }
        }
    }

    fn context_fips(&self, ctx: NativeHandle) -> EngineResult<bool> {
        match self.table.get(&ctx) {
            Some(Entry {
                object: SimObject::Context { fips },
                ..
            }) => Ok(*fips),
            _ => Err(EngineError::InvalidContext),
        }
    }

    /// Looks up `handle`, checking its kind and that it belongs to `ctx`.
    fn entry(
        &self,
        ctx: NativeHandle,
        handle: NativeHandle,
        handle_type: HandleType,
    ) -> EngineResult<&Entry> {
        if handle_type == HandleType::Context {
            self.context_fips(handle)?;
        } else {
            self.context_fips(ctx)?;
        }

        self.table
            .get(&handle)
            .filter(|entry| entry.object.handle_type() == handle_type)
            .filter(|entry| handle_type == HandleType::Context || entry.owner == ctx)
            .ok_or(EngineError::InvalidHandle)
    }
}
