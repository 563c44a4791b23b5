//! Connectivity and visibility signals fed to the scheduler.
//!
//! The engine never probes the network itself; the embedding host tells
//! it when the link or the UI surface changes state. [`HostSignal`] is a
//! watch-channel wrapper the host flips from its own event handlers
//! (navigator online/offline, page visibility, a heartbeat prober).

use tokio::sync::watch;

/// Source of an externally-observed boolean signal.
pub trait ConnectivitySource: Send + Sync {
    /// Last observed state.
    fn is_online(&self) -> bool;

    /// Receiver that fires on every state change.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Host-driven signal backed by a watch channel.
///
/// # Example
///
/// ```
/// use offline_sync::connectivity::{ConnectivitySource, HostSignal};
///
/// let signal = HostSignal::new(false);
/// assert!(!signal.is_online());
/// signal.set(true);
/// assert!(signal.is_online());
/// ```
#[derive(Debug)]
pub struct HostSignal {
    tx: watch::Sender<bool>,
}

impl HostSignal {
    #[must_use]
    pub fn new(initial: bool) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new state. Subscribers only wake on actual changes.
    pub fn set(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    #[must_use]
    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }
}

impl ConnectivitySource for HostSignal {
    fn is_online(&self) -> bool {
        self.get()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for HostSignal {
    fn default() -> Self {
        Self::new(true)
    }
}
