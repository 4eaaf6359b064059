//! Reloadable configuration sections.
//!
//! A [`ConfigStore`] holds the current value of one section. `SIGHUP`
//! handling replaces it with [`ConfigStore::update`]; request handlers read
//! a copy with [`ConfigStore::get`], and background processors hold a
//! [`ConfigWatcher`] to react to changes.

use std::sync::Arc;
use tokio::sync::watch;

pub struct ConfigStore<T> {
    tx: Arc<watch::Sender<T>>,
}

/// Change notifications for one [`ConfigStore`].
pub struct ConfigWatcher<T> {
    rx: watch::Receiver<T>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the stored value and wake every watcher.
    pub fn update(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn subscribe(&self) -> ConfigWatcher<T> {
        ConfigWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone> ConfigStore<T> {
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone> ConfigWatcher<T> {
    /// Wait for the next update and return the new value.
    ///
    /// Returns `Err` once the store has been dropped.
    pub async fn changed(&mut self) -> Result<T, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }

    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }
}
