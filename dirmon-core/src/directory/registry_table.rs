//! `src/directory/registry_table.rs`
//!
//! One-shot ready callbacks and persistent monitors of a single directory.
//! Pure bookkeeping; the engine decides when entries fire.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use indexmap::IndexMap;

use super::events::DirectoryEvent;
use crate::{error::CoreResult, model::attributes::FileAttributes, model::file::File};

static NEXT_CLIENT: AtomicU64 = AtomicU64::new(1);
static NEXT_CALLBACK: AtomicU64 = AtomicU64::new(1);

/// Identity of a monitoring client. One registration per client per directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    #[must_use]
    pub fn new() -> Self {
        Self(NEXT_CLIENT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `call_when_ready`, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

pub type ReadyCallback = Box<dyn FnOnce(CoreResult<Vec<Arc<File>>>) + Send>;
pub type MonitorCallback = Arc<dyn Fn(&DirectoryEvent) + Send + Sync>;

pub(crate) struct PendingCallback {
    pub id: CallbackId,
    pub attrs: FileAttributes,
    pub wait_for_file_list: bool,
    pub callback: ReadyCallback,
}

pub(crate) struct Monitor {
    /// Changes on every (re-)registration; deliveries carry the value they
    /// were computed for and are dropped when it no longer matches.
    pub registration: u64,
    pub attrs: FileAttributes,
    pub monitor_hidden_files: bool,
    pub callback: MonitorCallback,
    pub ready_sent: bool,
}

#[derive(Default)]
pub(crate) struct RegistryTable {
    callbacks: Vec<PendingCallback>,
    monitors: IndexMap<ClientId, Monitor>,
    next_registration: u64,
}

impl RegistryTable {
    pub fn add_callback(
        &mut self,
        attrs: FileAttributes,
        wait_for_file_list: bool,
        callback: ReadyCallback,
    ) -> CallbackId {
        let id = CallbackId(NEXT_CALLBACK.fetch_add(1, Ordering::Relaxed));

        self.callbacks.push(PendingCallback {
            id,
            attrs,
            wait_for_file_list,
            callback,
        });

        id
    }

    /// False when `id` already fired or was cancelled.
    pub fn cancel_callback(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|c| c.id != id);

        self.callbacks.len() != before
    }

    pub fn has_callbacks(&self) -> bool {
        !self.callbacks.is_empty()
    }

    /// Ids of callbacks matching `pred`, in registration order, paired with
    /// whatever `pred` produced for them.
    pub fn matching<T>(
        &self,
        mut pred: impl FnMut(&PendingCallback) -> Option<T>,
    ) -> Vec<(CallbackId, T)> {
        self.callbacks
            .iter()
            .filter_map(|cb| pred(cb).map(|out| (cb.id, out)))
            .collect()
    }

    /// Remove a callback for invocation. `None` when it was cancelled meanwhile.
    pub fn take_callback(&mut self, id: CallbackId) -> Option<PendingCallback> {
        let pos = self.callbacks.iter().position(|c| c.id == id)?;

        Some(self.callbacks.remove(pos))
    }

    /// Register or replace `client`'s monitor. Attributes of a replaced
    /// registration are kept. Returns true for the first monitor.
    pub fn add_monitor(
        &mut self,
        client: ClientId,
        monitor_hidden_files: bool,
        attrs: FileAttributes,
        callback: MonitorCallback,
    ) -> bool {
        let was_empty = self.monitors.is_empty();
        self.next_registration += 1;

        let attrs = self
            .monitors
            .get(&client)
            .map_or(attrs, |previous| previous.attrs | attrs);

        self.monitors.insert(
            client,
            Monitor {
                registration: self.next_registration,
                attrs,
                monitor_hidden_files,
                callback,
                ready_sent: false,
            },
        );

        was_empty
    }

    /// False when `client` had no monitor.
    pub fn remove_monitor(&mut self, client: ClientId) -> bool {
        self.monitors.shift_remove(&client).is_some()
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    pub fn monitors(&self) -> impl Iterator<Item = (&ClientId, &Monitor)> {
        self.monitors.iter()
    }

    pub fn monitors_mut(&mut self) -> impl Iterator<Item = (&ClientId, &mut Monitor)> {
        self.monitors.iter_mut()
    }

    pub fn is_live(&self, client: ClientId, registration: u64) -> bool {
        self.monitors
            .get(&client)
            .is_some_and(|m| m.registration == registration)
    }

    /// Union of every attribute set anybody is waiting for.
    pub fn wanted(&self) -> FileAttributes {
        let from_callbacks = self
            .callbacks
            .iter()
            .fold(FileAttributes::empty(), |acc, c| acc | c.attrs);

        self.monitors
            .values()
            .fold(from_callbacks, |acc, m| acc | m.attrs)
    }

    /// A complete listing is needed by monitors and by waiting callbacks.
    pub fn wants_file_list(&self) -> bool {
        !self.monitors.is_empty() || self.callbacks.iter().any(|c| c.wait_for_file_list)
    }

    pub fn has_unready_monitors(&self) -> bool {
        self.monitors.values().any(|m| !m.ready_sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_monitor() -> MonitorCallback {
        Arc::new(|_: &DirectoryEvent| {})
    }

    #[test]
    fn reregistration_replaces_and_merges() {
        let mut table = RegistryTable::default();
        let client = ClientId::new();

        assert!(table.add_monitor(client, false, FileAttributes::INFO, noop_monitor()));
        let first = table.monitors().next().map(|(_, m)| m.registration).unwrap();

        assert!(!table.add_monitor(client, true, FileAttributes::MIME_TYPE, noop_monitor()));
        assert_eq!(table.monitor_count(), 1);

        let (_, monitor) = table.monitors().next().unwrap();
        assert_eq!(monitor.attrs, FileAttributes::INFO | FileAttributes::MIME_TYPE);
        assert!(monitor.monitor_hidden_files);
        assert!(!table.is_live(client, first));
        assert!(table.is_live(client, monitor.registration));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut table = RegistryTable::default();
        let id = table.add_callback(FileAttributes::INFO, true, Box::new(|_| {}));

        assert!(table.wants_file_list());
        assert!(table.cancel_callback(id));
        assert!(!table.cancel_callback(id));
        assert!(!table.has_callbacks());
    }

    #[test]
    fn wanted_is_the_union() {
        let mut table = RegistryTable::default();
        table.add_callback(FileAttributes::MIME_TYPE, false, Box::new(|_| {}));
        table.add_monitor(ClientId::new(), false, FileAttributes::LINK_INFO, noop_monitor());

        assert_eq!(
            table.wanted(),
            FileAttributes::MIME_TYPE | FileAttributes::LINK_INFO
        );
    }

    #[test]
    fn matching_then_take_respects_cancellation() {
        let mut table = RegistryTable::default();
        let a = table.add_callback(FileAttributes::INFO, false, Box::new(|_| {}));
        let b = table.add_callback(FileAttributes::INFO, true, Box::new(|_| {}));
        let c = table.add_callback(FileAttributes::INFO, false, Box::new(|_| {}));

        let ready = table.matching(|cb| (!cb.wait_for_file_list).then_some(()));
        let ids: Vec<CallbackId> = ready.iter().map(|(id, ())| *id).collect();
        assert_eq!(ids, vec![a, c]);

        assert!(table.take_callback(a).is_some());
        assert!(table.cancel_callback(c));
        assert!(table.take_callback(c).is_none());
        assert!(table.cancel_callback(b));
    }
}
