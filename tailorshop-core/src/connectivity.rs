//! Believed network status.
//!
//! The host reports online/offline transitions; the gateway reads the
//! current value and the sync service waits for transitions to online. The
//! value is a hint only: an "online" reading can still fail at the network
//! layer, and every caller falls back to offline behaviour on failure.

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self { sender }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Records a status change. Subscribers are only woken when the value
    /// actually changes.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
