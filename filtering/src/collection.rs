//! Ordered, session-owned collection of favorite and history entries.

use crate::canonical::auto_name;
use crate::canonical::canonical_hash;
use crate::canonical::deparam;
use crate::canonical::rehash;
use crate::entry::Entry;
use crate::entry::EntryStatus;
use crate::notify::Notifier;
use crate::notify::Severity;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Value produced by a mutation, and whether favorites must be written
/// through to the preference store afterwards.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation<T> {
    pub value: T,
    pub persist: bool,
}

impl<T> Mutation<T> {
    fn keep(value: T) -> Self {
        Self {
            value,
            persist: false,
        }
    }

    fn write(value: T) -> Self {
        Self {
            value,
            persist: true,
        }
    }
}

pub struct FilterCollection {
    entries: Vec<Entry>,
    current_hash: Option<String>,
    load_retried: bool,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl FilterCollection {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_clock(notifier, Arc::new(SystemClock))
    }

    pub fn with_clock(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            current_hash: None,
            load_retried: false,
            clock,
            notifier,
        }
    }

    /// Records a visit to, or an explicit favorite of, `locator`.
    ///
    /// Returns whether the matching entry is a favorite afterwards. Locators
    /// without filters are ignored; when they come from navigation they also
    /// clear the current location.
    pub fn add_item(
        &mut self,
        locator: &str,
        favorite_requested: bool,
        is_current: bool,
    ) -> Mutation<bool> {
        let parameters = deparam(locator);
        if !parameters.has_filters() {
            if favorite_requested {
                self.notifier
                    .log(Severity::Warning, "Only filtered views can be remembered");
            } else {
                self.current_hash = None;
            }
            return Mutation::keep(false);
        }

        let hash = rehash(&parameters);
        let now = self.clock.now();
        let existing = self.position(&hash);
        if is_current {
            self.current_hash = Some(hash.clone());
            if let Some(index) = existing {
                self.entries[index].last_visited_at = Some(now);
            }
        }

        match existing {
            Some(index) if favorite_requested => {
                let entry = &mut self.entries[index];
                if entry.is_favorite() {
                    self.notifier.log(
                        Severity::Warning,
                        &format!("\"{}\" is already remembered", entry.name),
                    );
                    return Mutation::keep(true);
                }
                entry.status = EntryStatus::Favorite;
                entry.created_at = now;
                Mutation::write(true)
            }
            Some(index) => {
                self.entries[index].created_at = now;
                let favorite = self.entries[index].is_favorite();
                self.resort();
                Mutation::keep(favorite)
            }
            None => {
                let status = if favorite_requested {
                    EntryStatus::Favorite
                } else {
                    EntryStatus::History
                };
                self.entries.push(Entry {
                    name: auto_name(&parameters),
                    canonical_hash: hash,
                    parameters,
                    created_at: now,
                    last_visited_at: is_current.then_some(now),
                    status,
                });
                self.resort();
                Mutation {
                    value: favorite_requested,
                    persist: favorite_requested,
                }
            }
        }
    }

    /// Demotes a favorite to history; it drops out of the next packed record.
    pub fn remove_item(&mut self, hash: &str) -> Mutation<bool> {
        let Some(index) = self.position(hash) else {
            debug!("remove_item: no entry for {hash:?}");
            return Mutation::keep(false);
        };
        let now = self.clock.now();
        let entry = &mut self.entries[index];
        entry.status = EntryStatus::History;
        entry.created_at = now;
        Mutation::write(true)
    }

    /// Moves the entry to the front of the sequence.
    pub fn promote_item(&mut self, hash: &str) -> Mutation<bool> {
        let Some(index) = self.position(hash) else {
            debug!("promote_item: no entry for {hash:?}");
            return Mutation::keep(false);
        };
        let entry = self.entries.remove(index);
        self.entries.insert(0, entry);
        Mutation::write(true)
    }

    /// Names the entry for `hash`, favoriting it first when needed. An unknown
    /// hash is treated as a locator and materialized as a new favorite.
    pub fn rename_item(&mut self, hash: &str, name: &str) -> Mutation<Option<Entry>> {
        let name = name.trim();
        if name.is_empty() {
            self.notifier
                .log(Severity::Warning, "A remembered filter needs a name");
            return Mutation::keep(None);
        }
        let Mutation {
            value: Some(index),
            ..
        } = self.ensure_entry(hash)
        else {
            return Mutation::keep(None);
        };
        Mutation::write(Some(self.apply_rename(index, name)))
    }

    fn ensure_entry(&mut self, hash: &str) -> Mutation<Option<usize>> {
        if let Some(index) = self.position(hash) {
            return Mutation::keep(Some(index));
        }
        let added = self.add_item(hash, true, false);
        if !added.value {
            return Mutation::keep(None);
        }
        Mutation {
            value: self.position(hash),
            persist: added.persist,
        }
    }

    fn apply_rename(&mut self, index: usize, name: &str) -> Entry {
        let now = self.clock.now();
        let entry = &mut self.entries[index];
        entry.name = name.to_string();
        if !entry.is_favorite() {
            entry.status = EntryStatus::Favorite;
            entry.created_at = now;
        }
        let renamed = entry.clone();
        self.notifier
            .log(Severity::Success, &format!("Renamed to \"{}\"", renamed.name));
        renamed
    }

    /// Favorites first in their existing order, then history newest first.
    pub fn resort(&mut self) {
        let (mut favorites, mut history): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(Entry::is_favorite);
        history.sort_by_key(|entry| Reverse(entry.created_at));
        favorites.append(&mut history);
        self.entries = favorites;
    }

    /// Folds favorites loaded from the preference store into the live
    /// session. Stored names and timestamps win; visit stamps are kept.
    pub fn merge_persisted(&mut self, persisted: Vec<Entry>) {
        let mut live = std::mem::take(&mut self.entries);
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(persisted.len() + live.len());
        for mut favorite in persisted {
            if !seen.insert(favorite.canonical_hash.clone()) {
                continue;
            }
            if let Some(index) = live
                .iter()
                .position(|entry| entry.canonical_hash == favorite.canonical_hash)
            {
                favorite.last_visited_at = live.remove(index).last_visited_at;
            }
            favorite.status = EntryStatus::Favorite;
            merged.push(favorite);
        }
        merged.extend(live);
        self.entries = merged;
        self.resort();
    }

    /// Drops everything owned by the current session.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.current_hash = None;
        self.load_retried = false;
    }

    /// `true` exactly once per session: the first failed load may retry.
    pub(crate) fn claim_retry(&mut self) -> bool {
        !std::mem::replace(&mut self.load_retried, true)
    }

    pub fn latest(&self) -> &[Entry] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn count_favorites(&self) -> usize {
        self.favorites().count()
    }

    pub fn count_history(&self) -> usize {
        self.history().count()
    }

    pub fn favorites(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| entry.is_favorite())
    }

    pub fn history(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| !entry.is_favorite())
    }

    pub fn find(&self, hash: &str) -> Option<&Entry> {
        self.position(hash).map(|index| &self.entries[index])
    }

    pub fn current_hash(&self) -> Option<&str> {
        self.current_hash.as_deref()
    }

    pub fn is_current_favorite(&self) -> bool {
        self.current_hash
            .as_deref()
            .and_then(|hash| self.find(hash))
            .is_some_and(Entry::is_favorite)
    }

    /// Hashes are canonicalized before lookup, so a raw locator finds its
    /// entry too.
    fn position(&self, hash: &str) -> Option<usize> {
        let key = canonical_hash(hash).unwrap_or_else(|| hash.to_string());
        self.entries
            .iter()
            .position(|entry| entry.canonical_hash == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pack;
    use crate::notify::RecordingNotifier;
    use crate::test_support::StepClock;
    use pretty_assertions::assert_eq;

    const BOB: &str = "Simulations?filters=Owner=bob";

    fn collection() -> (FilterCollection, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let collection = FilterCollection::with_clock(notifier.clone(), Arc::new(StepClock::new()));
        (collection, notifier)
    }

    fn names(collection: &FilterCollection) -> Vec<&str> {
        collection
            .latest()
            .iter()
            .map(|entry| entry.name.as_str())
            .collect()
    }

    #[test]
    fn favorite_request_creates_named_favorite() {
        let (mut collection, _) = collection();
        let outcome = collection.add_item(BOB, true, false);
        assert_eq!(outcome, Mutation::write(true));
        assert_eq!(collection.count_favorites(), 1);
        let entry = &collection.latest()[0];
        assert_eq!(entry.name, "Simulations WHERE Owner=bob");
        assert_eq!(entry.status, EntryStatus::Favorite);
        assert_eq!(entry.last_visited_at, None);
    }

    #[test]
    fn repeated_favorite_request_warns_without_duplicate() {
        let (mut collection, notifier) = collection();
        let _ = collection.add_item(BOB, true, false);
        let outcome = collection.add_item(BOB, true, false);
        assert_eq!(outcome, Mutation::keep(true));
        assert_eq!(collection.count_favorites(), 1);
        assert_eq!(collection.count(), 1);
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, Severity::Warning);
        assert!(messages[0].1.contains("already remembered"));
    }

    #[test]
    fn visiting_a_favorite_stamps_it() {
        let (mut collection, _) = collection();
        let _ = collection.add_item(BOB, true, false);
        let outcome = collection.add_item(BOB, false, true);
        assert_eq!(outcome, Mutation::keep(true));
        assert_eq!(collection.count(), 1);
        assert!(collection.latest()[0].last_visited_at.is_some());
        assert_eq!(collection.current_hash(), Some(BOB));
        assert!(collection.is_current_favorite());
    }

    #[test]
    fn removing_a_favorite_demotes_it_to_history() {
        let (mut collection, _) = collection();
        let _ = collection.add_item(BOB, true, false);
        let outcome = collection.remove_item(BOB);
        assert_eq!(outcome, Mutation::write(true));
        assert_eq!(collection.count_favorites(), 0);
        assert_eq!(collection.count_history(), 1);
        assert!(pack(collection.latest()).is_empty());
        assert_eq!(collection.remove_item("Simulations?filters=Owner=ann"), Mutation::keep(false));
    }

    #[test]
    fn entry_is_reachable_by_its_own_hash() {
        let (mut collection, _) = collection();
        let _ = collection.add_item("Work%2FItems?filters=Owner=bob", true, false);
        let hash = collection.latest()[0].canonical_hash.clone();
        assert_eq!(hash, "Work%2FItems?filters=Owner=bob");

        assert_eq!(collection.remove_item(&hash), Mutation::write(true));
        assert_eq!(collection.count_favorites(), 0);
        assert_eq!(collection.find(&hash).map(|entry| entry.status), Some(EntryStatus::History));
    }

    #[test]
    fn locator_without_filters_is_ignored() {
        let (mut collection, notifier) = collection();
        let _ = collection.add_item(BOB, false, true);
        assert_eq!(collection.current_hash(), Some(BOB));

        assert_eq!(
            collection.add_item("Simulations?orderby=Name", false, true),
            Mutation::keep(false)
        );
        assert_eq!(collection.current_hash(), None);
        assert!(notifier.messages().is_empty());

        assert_eq!(
            collection.add_item("Simulations", true, false),
            Mutation::keep(false)
        );
        assert_eq!(notifier.count(Severity::Warning), 1);
        assert_eq!(collection.count(), 1);
    }

    #[test]
    fn history_visits_never_persist() {
        let (mut collection, _) = collection();
        let first = collection.add_item("Simulations?filters=State=Failed", false, true);
        assert_eq!(first, Mutation::keep(false));
        let again = collection.add_item("Simulations?filters=State=Failed", false, true);
        assert_eq!(again, Mutation::keep(false));
        assert_eq!(collection.count_history(), 1);
    }

    #[test]
    fn equivalent_locators_share_one_entry() {
        let (mut collection, _) = collection();
        let locators = [
            "Simulations?filters=Owner=bob,State=Failed",
            "Simulations?filters=State=Failed,Owner=bob",
            "#/Simulations?count=10&filters=State%3DFailed,Owner%3Dbob",
            "Simulations?filters=State=Failed,Owner=bob&count=10",
            "Simulations?filters=Owner=bob",
        ];
        for (index, locator) in locators.iter().enumerate() {
            let _ = collection.add_item(locator, index % 2 == 0, index % 3 == 0);
        }
        let hashes = collection
            .latest()
            .iter()
            .map(|entry| entry.canonical_hash.clone())
            .collect::<HashSet<_>>();
        assert_eq!(hashes.len(), collection.count());
        assert_eq!(collection.count(), 3);
    }

    #[test]
    fn history_is_newest_first_and_favorites_keep_their_order() {
        let (mut collection, _) = collection();
        let _ = collection.add_item("Simulations?filters=A=1", true, false);
        let _ = collection.add_item("Simulations?filters=B=1", true, false);
        let _ = collection.add_item("Simulations?filters=C=1", false, true);
        let _ = collection.add_item("Simulations?filters=D=1", false, true);
        assert_eq!(
            names(&collection),
            vec![
                "Simulations WHERE A=1",
                "Simulations WHERE B=1",
                "Simulations WHERE D=1",
                "Simulations WHERE C=1",
            ]
        );

        // A recency bump on a favorite does not move it.
        let _ = collection.add_item("Simulations?filters=A=1", false, true);
        // A recency bump on history does.
        let _ = collection.add_item("Simulations?filters=C=1", false, true);
        assert_eq!(
            names(&collection),
            vec![
                "Simulations WHERE A=1",
                "Simulations WHERE B=1",
                "Simulations WHERE C=1",
                "Simulations WHERE D=1",
            ]
        );

        let before = names(&collection)
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        collection.resort();
        assert_eq!(names(&collection), before);
    }

    #[test]
    fn promote_moves_only_the_target() {
        let (mut collection, _) = collection();
        for clause in ["A=1", "B=1", "C=1"] {
            let _ = collection.add_item(&format!("Simulations?filters={clause}"), true, false);
        }
        let outcome = collection.promote_item("Simulations?filters=C=1");
        assert_eq!(outcome, Mutation::write(true));
        collection.resort();
        assert_eq!(
            names(&collection),
            vec![
                "Simulations WHERE C=1",
                "Simulations WHERE A=1",
                "Simulations WHERE B=1",
            ]
        );
        assert_eq!(collection.promote_item("Simulations?filters=Z=1"), Mutation::keep(false));
    }

    #[test]
    fn rename_promotes_history_without_reordering_favorites() {
        let (mut collection, notifier) = collection();
        let _ = collection.add_item("Simulations?filters=A=1", true, false);
        let _ = collection.add_item("Simulations?filters=B=1", true, false);
        let _ = collection.add_item("Simulations?filters=C=1", false, true);

        let outcome = collection.rename_item("Simulations?filters=C=1", "  Third  ");
        assert!(outcome.persist);
        let renamed = outcome.value.unwrap();
        assert_eq!(renamed.name, "Third");
        assert_eq!(renamed.status, EntryStatus::Favorite);
        collection.resort();
        assert_eq!(
            names(&collection),
            vec!["Simulations WHERE A=1", "Simulations WHERE B=1", "Third"]
        );

        let outcome = collection.rename_item("Simulations?filters=A=1", "First");
        assert!(outcome.persist);
        collection.resort();
        assert_eq!(names(&collection), vec!["First", "Simulations WHERE B=1", "Third"]);
        assert_eq!(notifier.count(Severity::Success), 2);
    }

    #[test]
    fn rename_materializes_unknown_locator() {
        let (mut collection, notifier) = collection();
        let outcome = collection.rename_item("Experiments?tagFilters=gpu", "GPU runs");
        assert_eq!(outcome.value.map(|entry| entry.name), Some("GPU runs".to_string()));
        assert!(outcome.persist);
        assert_eq!(collection.count_favorites(), 1);
        assert_eq!(collection.latest()[0].name, "GPU runs");
        assert_eq!(notifier.count(Severity::Warning), 0);

        assert_eq!(collection.rename_item("Experiments", "nothing").value, None);
        assert_eq!(collection.rename_item("Experiments?tagFilters=gpu", "  ").value, None);
        assert_eq!(collection.count(), 1);
    }

    #[test]
    fn merge_keeps_live_history_and_stored_names() {
        let (mut collection, _) = collection();
        let _ = collection.add_item(BOB, false, true);
        let _ = collection.add_item("Simulations?filters=Owner=ann", false, false);

        let stored = Entry {
            name: "Bob's runs".to_string(),
            canonical_hash: BOB.to_string(),
            parameters: deparam(BOB),
            created_at: OffsetDateTime::UNIX_EPOCH,
            last_visited_at: None,
            status: EntryStatus::Favorite,
        };
        collection.merge_persisted(vec![stored.clone(), stored]);

        assert_eq!(collection.count(), 2);
        let bob = collection.find(BOB).unwrap();
        assert_eq!(bob.name, "Bob's runs");
        assert!(bob.is_favorite());
        assert!(bob.last_visited_at.is_some());
        assert_eq!(collection.latest()[0].canonical_hash, BOB);
        assert!(collection.is_current_favorite());
    }

    #[test]
    fn reset_clears_session_state() {
        let (mut collection, _) = collection();
        let _ = collection.add_item(BOB, true, true);
        assert!(collection.claim_retry());
        assert!(!collection.claim_retry());
        collection.reset();
        assert_eq!(collection.count(), 0);
        assert_eq!(collection.current_hash(), None);
        assert!(collection.claim_retry());
    }
}
