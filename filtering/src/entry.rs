use crate::canonical::FilterParams;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Pinned by the user and written to the preference store.
    Favorite,
    /// Visited during this session only.
    History,
}

impl EntryStatus {
    pub fn is_favorite(self) -> bool {
        matches!(self, EntryStatus::Favorite)
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryStatus::Favorite => "favorite",
            EntryStatus::History => "history",
        }
    }
}

/// One remembered filter query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub canonical_hash: String,
    pub parameters: FilterParams,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_visited_at: Option<OffsetDateTime>,
    pub status: EntryStatus,
}

impl Entry {
    pub fn is_favorite(&self) -> bool {
        self.status.is_favorite()
    }
}
