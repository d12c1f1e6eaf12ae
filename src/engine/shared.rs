use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::Notify;

use crate::response::{DeviceStatus, ParsedResponse};

/// One logged inbound notification, for diagnostics (spec §5).
#[derive(Debug, Clone)]
pub struct NotificationLogEntry {
    /// When the notification was observed.
    pub received_at: Instant,
    /// Raw notification bytes, as delivered by the transport.
    pub raw: Vec<u8>,
    /// The parsed record.
    pub parsed: ParsedResponse,
}

/// Mutable state shared between the upload task and the notify task (spec §5).
///
/// The notify task is the sole writer of `errored`, `device_status`,
/// `device_ready`, and the notification log; the upload task only reads
/// them and is the sole writer of the two one-shot waiters.
pub(super) struct SharedState {
    errored: AtomicBool,
    device_ready: AtomicBool,
    device_status: Mutex<Option<DeviceStatus>>,
    notifications: Mutex<Vec<NotificationLogEntry>>,
    /// Signalled by the notify task once per inbound notification; consumed
    /// by finalize's "wait for the next notification" step.
    pub notification_waiter: Notify,
    /// Signalled by the notify task the first time a device-status record
    /// is observed; consumed by the connect algorithm's await-status step.
    pub status_waiter: Notify,
}

impl SharedState {
    pub(super) fn new() -> Self {
        Self {
            errored: AtomicBool::new(false),
            device_ready: AtomicBool::new(false),
            device_status: Mutex::new(None),
            notifications: Mutex::new(Vec::new()),
            notification_waiter: Notify::new(),
            status_waiter: Notify::new(),
        }
    }

    pub(super) fn is_errored(&self) -> bool {
        self.errored.load(Ordering::SeqCst)
    }

    pub(super) fn device_status(&self) -> Option<DeviceStatus> {
        self.device_status.lock().unwrap().clone()
    }

    pub(super) fn notifications_snapshot(&self) -> Vec<NotificationLogEntry> {
        self.notifications.lock().unwrap().clone()
    }

    /// Applies one inbound notification: appends to the log, latches the
    /// error flag on the error sentinel, and promotes `device_ready` exactly
    /// once on the first device-status record. Wakes the relevant waiters.
    pub(super) fn record_notification(&self, raw: Vec<u8>, parsed: ParsedResponse) {
        if parsed.is_error() {
            self.errored.store(true, Ordering::SeqCst);
        }

        if let Some(status) = parsed.device_status() {
            let mut guard = self.device_status.lock().unwrap();
            if guard.is_none() {
                *guard = Some(status.clone());
                drop(guard);
                self.device_ready.store(true, Ordering::SeqCst);
                self.status_waiter.notify_one();
            }
        }

        self.notifications.lock().unwrap().push(NotificationLogEntry {
            received_at: Instant::now(),
            raw,
            parsed,
        });
        self.notification_waiter.notify_one();
    }
}
