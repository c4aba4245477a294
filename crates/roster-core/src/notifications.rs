use std::{
    collections::BTreeMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::types::MemberIdentity;

const DEFAULT_STREAM_BUFFER: usize = 64;

/// Notification pushed by the engine layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EngineNotification {
    /// Membership of a group changed (join, leave, invitation, role).
    GroupMembersChanged { group_id: String },
    /// The user accepted the details published by a group's owner.
    GroupPublishedDetailsTrusted { group_id: String },
    /// A contact's details were updated.
    ContactDetailsUpdated { identity: MemberIdentity },
    /// A new device backup seed was generated.
    DeviceBackupSeedGenerated,
    /// A device backup fetch completed.
    DeviceBackupFetched { success: bool },
    /// A backup restore completed.
    BackupRestoreFinished { success: bool },
}

/// Discriminant used to pick which notifications a handler receives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    GroupMembersChanged,
    GroupPublishedDetailsTrusted,
    ContactDetailsUpdated,
    DeviceBackupSeedGenerated,
    DeviceBackupFetched,
    BackupRestoreFinished,
}

impl EngineNotification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::GroupMembersChanged { .. } => NotificationKind::GroupMembersChanged,
            Self::GroupPublishedDetailsTrusted { .. } => {
                NotificationKind::GroupPublishedDetailsTrusted
            }
            Self::ContactDetailsUpdated { .. } => NotificationKind::ContactDetailsUpdated,
            Self::DeviceBackupSeedGenerated => NotificationKind::DeviceBackupSeedGenerated,
            Self::DeviceBackupFetched { .. } => NotificationKind::DeviceBackupFetched,
            Self::BackupRestoreFinished { .. } => NotificationKind::BackupRestoreFinished,
        }
    }
}

/// Callback invoked for each matching notification.
pub type NotificationHandler = Arc<dyn Fn(&EngineNotification) + Send + Sync + 'static>;

/// Registration number returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn registration_number(&self) -> u64 {
        self.0
    }
}

struct Subscriber {
    kind: NotificationKind,
    handler: NotificationHandler,
}

/// Typed publish/subscribe bus for engine notifications.
///
/// Handlers registered with `subscribe` run synchronously on the publishing
/// thread in registration order. Async consumers can use `stream` instead.
#[derive(Clone)]
pub struct NotificationBus {
    subscribers: Arc<RwLock<BTreeMap<u64, Subscriber>>>,
    next_registration: Arc<AtomicU64>,
    stream_tx: broadcast::Sender<EngineNotification>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_BUFFER)
    }
}

impl NotificationBus {
    /// Create a bus whose async stream buffers up to `stream_buffer` notifications.
    pub fn new(stream_buffer: usize) -> Self {
        let (stream_tx, _) = broadcast::channel(stream_buffer.max(1));
        Self {
            subscribers: Arc::new(RwLock::new(BTreeMap::new())),
            next_registration: Arc::new(AtomicU64::new(1)),
            stream_tx,
        }
    }

    /// Register `handler` for notifications of `kind`.
    pub fn subscribe<F>(&self, kind: NotificationKind, handler: F) -> SubscriptionHandle
    where
        F: Fn(&EngineNotification) + Send + Sync + 'static,
    {
        let registration = self.next_registration.fetch_add(1, Ordering::Relaxed);
        let subscriber = Subscriber {
            kind,
            handler: Arc::new(handler),
        };
        match self.subscribers.write() {
            Ok(mut subscribers) => {
                subscribers.insert(registration, subscriber);
            }
            Err(poisoned) => {
                warn!("notification subscriber map poisoned; recovering");
                poisoned.into_inner().insert(registration, subscriber);
            }
        }
        debug!(registration, ?kind, "notification handler registered");
        SubscriptionHandle(registration)
    }

    /// Remove a handler. Returns `false` when it was already removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.remove(&handle.0).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(&handle.0).is_some(),
        };
        debug!(registration = handle.0, removed, "notification handler unregistered");
        removed
    }

    /// Deliver `notification` to matching handlers and stream subscribers.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, notification: EngineNotification) -> usize {
        let kind = notification.kind();
        // Handlers are cloned out so they may subscribe/unsubscribe re-entrantly.
        let handlers = {
            let subscribers = match self.subscribers.read() {
                Ok(subscribers) => subscribers,
                Err(poisoned) => poisoned.into_inner(),
            };
            subscribers
                .values()
                .filter(|subscriber| subscriber.kind == kind)
                .map(|subscriber| Arc::clone(&subscriber.handler))
                .collect::<Vec<_>>()
        };

        for handler in &handlers {
            handler(&notification);
        }
        trace!(?kind, delivered = handlers.len(), "notification published");

        let _ = self.stream_tx.send(notification);
        handlers.len()
    }

    /// Receive every notification asynchronously, regardless of kind.
    pub fn stream(&self) -> broadcast::Receiver<EngineNotification> {
        self.stream_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.read() {
            Ok(subscribers) => subscribers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder(
        bus: &NotificationBus,
        kind: NotificationKind,
    ) -> Arc<Mutex<Vec<EngineNotification>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(kind, move |notification| {
            sink.lock().expect("sink lock").push(notification.clone())
        });
        seen
    }

    #[test]
    fn delivers_only_matching_kind() {
        let bus = NotificationBus::default();
        let members = recorder(&bus, NotificationKind::GroupMembersChanged);
        let backups = recorder(&bus, NotificationKind::DeviceBackupFetched);

        let delivered = bus.publish(EngineNotification::GroupMembersChanged {
            group_id: "g1".into(),
        });

        assert_eq!(delivered, 1);
        assert_eq!(members.lock().expect("lock").len(), 1);
        assert!(backups.lock().expect("lock").is_empty());
    }

    #[test]
    fn unsubscribe_stops_delivery_and_is_idempotent() {
        let bus = NotificationBus::default();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let handle = bus.subscribe(NotificationKind::DeviceBackupSeedGenerated, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(EngineNotification::DeviceBackupSeedGenerated);
        assert!(bus.unsubscribe(handle));
        assert!(!bus.unsubscribe(handle));
        bus.publish(EngineNotification::DeviceBackupSeedGenerated);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn registration_numbers_are_never_reused() {
        let bus = NotificationBus::default();
        let a = bus.subscribe(NotificationKind::BackupRestoreFinished, |_| {});
        bus.unsubscribe(a);
        let b = bus.subscribe(NotificationKind::BackupRestoreFinished, |_| {});
        assert!(b.registration_number() > a.registration_number());
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let bus = NotificationBus::default();
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
        let bus_for_handler = bus.clone();
        let slot_for_handler = Arc::clone(&slot);
        let handle = bus.subscribe(NotificationKind::DeviceBackupFetched, move |_| {
            if let Some(handle) = slot_for_handler.lock().expect("slot lock").take() {
                bus_for_handler.unsubscribe(handle);
            }
        });
        *slot.lock().expect("slot lock") = Some(handle);

        assert_eq!(
            bus.publish(EngineNotification::DeviceBackupFetched { success: true }),
            1
        );
        assert_eq!(
            bus.publish(EngineNotification::DeviceBackupFetched { success: true }),
            0
        );
    }

    #[tokio::test]
    async fn stream_receives_all_kinds() {
        let bus = NotificationBus::default();
        let mut stream = bus.stream();

        bus.publish(EngineNotification::ContactDetailsUpdated {
            identity: MemberIdentity::new(vec![1]),
        });
        bus.publish(EngineNotification::BackupRestoreFinished { success: false });

        let first = stream.recv().await.expect("first notification");
        let second = stream.recv().await.expect("second notification");
        assert_eq!(first.kind(), NotificationKind::ContactDetailsUpdated);
        assert_eq!(
            second,
            EngineNotification::BackupRestoreFinished { success: false }
        );
    }
}
