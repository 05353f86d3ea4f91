use tokio::sync::mpsc;

/// Callbacks into the session layer that owns live player profiles.
pub trait StoreHooks: Send + Sync {
    /// A stored record was deleted; drop any cached profile for it.
    fn profile_cleanup(&self, name: &str);

    /// The relational backend came back after an outage; every online
    /// profile should be saved once more.
    fn schedule_resave(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ProfileCleanup(String),
    ResaveAll,
}

/// Forwards hook calls as [`StoreEvent`]s to whoever holds the receiver.
#[derive(Debug, Clone)]
pub struct ChannelHooks {
    sender: mpsc::UnboundedSender<StoreEvent>,
}

impl ChannelHooks {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StoreEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: StoreEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("Store event dropped, no receiver");
        }
    }
}

impl StoreHooks for ChannelHooks {
    fn profile_cleanup(&self, name: &str) {
        self.send(StoreEvent::ProfileCleanup(name.to_string()));
    }

    fn schedule_resave(&self) {
        self.send(StoreEvent::ResaveAll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_hooks_forward_events() {
        let (hooks, mut receiver) = ChannelHooks::new();
        hooks.profile_cleanup("Alice");
        hooks.schedule_resave();
        assert_eq!(
            receiver.try_recv().unwrap(),
            StoreEvent::ProfileCleanup("Alice".to_string())
        );
        assert_eq!(receiver.try_recv().unwrap(), StoreEvent::ResaveAll);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (hooks, receiver) = ChannelHooks::new();
        drop(receiver);
        hooks.profile_cleanup("Bob");
    }
}
