//! Keeps a [`FilterCollection`] in step with the preference store.
//!
//! Favorites are loaded once per session with at most one delayed retry, and
//! written through after every mutation that touches them. History never
//! leaves memory.

use crate::codec::pack;
use crate::codec::unpack;
use crate::collection::FilterCollection;
use crate::collection::Mutation;
use crate::config::FilteringConfig;
use crate::entry::Entry;
use crate::notify::Notifier;
use crate::prefs::PreferenceStore;
use futures::Stream;
use futures::StreamExt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub struct FilterHistory {
    collection: Mutex<FilterCollection>,
    store: Arc<dyn PreferenceStore>,
    config: FilteringConfig,
    /// Bumped by every reset so loads begun earlier can tell they are stale.
    generation: AtomicU64,
    current_favorite: watch::Sender<bool>,
}

impl FilterHistory {
    /// Callers should [`refresh`](Self::refresh) before mutating favorites:
    /// every favorite write replaces the stored record with the favorites
    /// held in this session.
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        notifier: Arc<dyn Notifier>,
        config: FilteringConfig,
    ) -> Self {
        Self::with_collection(store, config, FilterCollection::new(notifier))
    }

    pub fn with_collection(
        store: Arc<dyn PreferenceStore>,
        config: FilteringConfig,
        collection: FilterCollection,
    ) -> Self {
        let (current_favorite, _) = watch::channel(collection.is_current_favorite());
        Self {
            collection: Mutex::new(collection),
            store,
            config,
            generation: AtomicU64::new(0),
            current_favorite,
        }
    }

    pub fn config(&self) -> &FilteringConfig {
        &self.config
    }

    /// Loads stored favorites into the session and returns the merged
    /// sequence. An unusable first read is retried once after the configured
    /// delay; after that the session simply starts without stored favorites.
    /// Run it before the first favorite mutation so stored favorites are not
    /// overwritten.
    pub async fn refresh(&self) -> Vec<Entry> {
        let generation = self.generation.load(Ordering::SeqCst);
        let favorites = match self.read_favorites().await {
            Some(favorites) => favorites,
            None => {
                if self.is_stale(generation) {
                    return self.latest();
                }
                let retry = self.lock().claim_retry();
                if retry {
                    let delay = self.config.retry_delay();
                    debug!("favorites not ready; retrying once in {delay:?}");
                    sleep(delay).await;
                    if self.is_stale(generation) {
                        debug!("session reset while waiting to retry; dropping load");
                        return self.latest();
                    }
                    self.read_favorites().await.unwrap_or_default()
                } else {
                    Vec::new()
                }
            }
        };

        let mut collection = self.lock();
        if self.is_stale(generation) {
            debug!("discarding favorites loaded for a previous session");
            return collection.latest().to_vec();
        }
        if !favorites.is_empty() {
            info!("loaded {} stored favorites", favorites.len());
            collection.merge_persisted(favorites);
        }
        self.publish(&collection);
        collection.latest().to_vec()
    }

    /// Writes the favorites of the current session to the preference store.
    pub fn update(&self) {
        let mut collection = self.lock();
        self.write_through(&mut collection);
    }

    pub fn add_item(&self, locator: &str, favorite_requested: bool, is_current: bool) -> bool {
        let mut collection = self.lock();
        let outcome = collection.add_item(locator, favorite_requested, is_current);
        self.finish(&mut collection, outcome)
    }

    pub fn remove_item(&self, hash: &str) -> bool {
        let mut collection = self.lock();
        let outcome = collection.remove_item(hash);
        self.finish(&mut collection, outcome)
    }

    pub fn promote_item(&self, hash: &str) -> bool {
        let mut collection = self.lock();
        let outcome = collection.promote_item(hash);
        self.finish(&mut collection, outcome)
    }

    /// Returns the renamed entry, or `None` when `hash` names no filters.
    pub fn rename_item(&self, hash: &str, name: &str) -> Option<Entry> {
        let mut collection = self.lock();
        let outcome = collection.rename_item(hash, name);
        self.finish(&mut collection, outcome)
    }

    /// Ends the current session. Loads still in flight are discarded.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut collection = self.lock();
        collection.reset();
        self.publish(&collection);
    }

    /// Sign-out/sign-in: start over and load the new identity's favorites.
    pub async fn switch_identity(&self) -> Vec<Entry> {
        self.reset();
        self.refresh().await
    }

    /// Records every locator of a navigation stream as the current location.
    /// Returns the number of locators seen.
    pub async fn follow_navigation<S>(&self, locators: S) -> usize
    where
        S: Stream<Item = String>,
    {
        let mut locators = std::pin::pin!(locators);
        let mut seen = 0;
        while let Some(locator) = locators.next().await {
            self.add_item(&locator, false, true);
            seen += 1;
        }
        seen
    }

    pub fn subscribe_current_favorite(&self) -> watch::Receiver<bool> {
        self.current_favorite.subscribe()
    }

    pub fn is_current_favorite(&self) -> bool {
        *self.current_favorite.borrow()
    }

    pub fn latest(&self) -> Vec<Entry> {
        self.lock().latest().to_vec()
    }

    pub fn find(&self, hash: &str) -> Option<Entry> {
        self.lock().find(hash).cloned()
    }

    pub fn current_hash(&self) -> Option<String> {
        self.lock().current_hash().map(str::to_string)
    }

    pub fn count(&self) -> usize {
        self.lock().count()
    }

    pub fn count_favorites(&self) -> usize {
        self.lock().count_favorites()
    }

    pub fn count_history(&self) -> usize {
        self.lock().count_history()
    }

    async fn read_favorites(&self) -> Option<Vec<Entry>> {
        let namespace = &self.config.namespace;
        let key = &self.config.favorites_key;
        match self.store.get(namespace, key).await {
            Ok(Some(record)) => {
                let favorites = unpack(&record);
                if favorites.is_empty() {
                    debug!("favorites record {namespace}/{key} holds nothing usable");
                    None
                } else {
                    Some(favorites)
                }
            }
            Ok(None) => {
                debug!("no favorites stored under {namespace}/{key}");
                None
            }
            Err(err) => {
                warn!("failed to read favorites from {namespace}/{key}: {err}");
                None
            }
        }
    }

    fn finish<T>(&self, collection: &mut FilterCollection, outcome: Mutation<T>) -> T {
        if outcome.persist {
            self.write_through(collection);
        } else {
            self.publish(collection);
        }
        outcome.value
    }

    fn write_through(&self, collection: &mut FilterCollection) {
        collection.resort();
        let record = pack(collection.latest());
        if let Err(err) = self
            .store
            .set(&self.config.namespace, &self.config.favorites_key, &record)
        {
            warn!("failed to persist {} favorites: {err}", record.len());
        }
        self.publish(collection);
    }

    fn publish(&self, collection: &FilterCollection) {
        let favorite = collection.is_current_favorite();
        self.current_favorite.send_if_modified(|current| {
            let changed = *current != favorite;
            *current = favorite;
            changed
        });
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn lock(&self) -> MutexGuard<'_, FilterCollection> {
        match self.collection.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
