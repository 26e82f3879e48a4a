/*!
# COMPS filter history

Remembers the filter queries a user runs against a data grid. Queries the
user pins become *favorites* and are written to a per-user preference store;
everything else is session *history* that disappears with the session.

```text
locator ──> canonical (identity) ──> FilterCollection ──> FilterHistory ──> PreferenceStore
                                        (ordering)         (load / write)
```

## Example

```rust,no_run
use comps_filtering::{FilterHistory, FilteringConfig, MemoryPreferenceStore, TracingNotifier};
use std::sync::Arc;

# async fn demo() {
let history = FilterHistory::new(
    Arc::new(MemoryPreferenceStore::new()),
    Arc::new(TracingNotifier),
    FilteringConfig::default(),
);
history.refresh().await;
history.add_item("Simulations?filters=Owner=bob", true, false);
assert_eq!(history.count_favorites(), 1);
# }
```
*/

pub mod canonical;
pub mod codec;
mod collection;
mod config;
mod entry;
mod error;
mod history;
mod notify;
mod prefs;
#[cfg(test)]
mod test_support;

pub use canonical::FilterParams;
pub use canonical::auto_name;
pub use canonical::canonical_hash;
pub use canonical::deparam;
pub use canonical::rehash;
pub use codec::PackedRecord;
pub use codec::pack;
pub use codec::unpack;
pub use collection::Clock;
pub use collection::FilterCollection;
pub use collection::Mutation;
pub use collection::SystemClock;
pub use config::FilteringConfig;
pub use entry::Entry;
pub use entry::EntryStatus;
pub use error::CodecError;
pub use error::ConfigError;
pub use error::FilteringError;
pub use error::PrefsError;
pub use error::Result;
pub use history::FilterHistory;
pub use notify::Notifier;
pub use notify::RecordingNotifier;
pub use notify::Severity;
pub use notify::TracingNotifier;
pub use prefs::FilePreferenceStore;
pub use prefs::MemoryPreferenceStore;
pub use prefs::PreferenceStore;
