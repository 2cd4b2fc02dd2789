//! Account domain types — record ids, attributes, records, and views
//!
//! Serializable, cloneable, and cheap to pass around.

use serde::{Deserialize, Serialize};

/// Opaque identifier of one account record. Never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRecordId(i64);

impl AccountRecordId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for AccountRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marker attached to an account record. Presence, not value, drives behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AccountAttribute {
    /// Record is scheduled for cleanup
    LoggedOut,
    /// Free-form tag owned by other subsystems
    Tag(String),
}

impl AccountAttribute {
    pub fn as_str(&self) -> &str {
        match self {
            Self::LoggedOut => "logged_out",
            Self::Tag(tag) => tag.as_str(),
        }
    }
}

impl std::fmt::Display for AccountAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One persisted account slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountRecordId,
    pub attributes: Vec<AccountAttribute>,
}

impl AccountRecord {
    pub fn new(id: AccountRecordId, attributes: Vec<AccountAttribute>) -> Self {
        Self { id, attributes }
    }

    pub fn has_attribute(&self, attribute: &AccountAttribute) -> bool {
        self.attributes.contains(attribute)
    }

    pub fn is_logged_out(&self) -> bool {
        self.has_attribute(&AccountAttribute::LoggedOut)
    }

    /// Copy of this record carrying the logged-out marker exactly once
    pub fn marked_logged_out(self) -> Self {
        if self.is_logged_out() {
            return self;
        }
        let mut attributes = self.attributes;
        attributes.push(AccountAttribute::LoggedOut);
        Self { id: self.id, attributes }
    }
}

/// Full, consistent snapshot of the store, republished on every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecordsView {
    /// Records ordered by id
    pub records: Vec<AccountRecord>,
    pub current_id: Option<AccountRecordId>,
}

impl AccountRecordsView {
    pub fn record(&self, id: AccountRecordId) -> Option<&AccountRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Ids of every record carrying the logged-out marker
    pub fn logged_out_ids(&self) -> impl Iterator<Item = AccountRecordId> + '_ {
        self.records.iter().filter(|r| r.is_logged_out()).map(|r| r.id)
    }
}

/// Authorization classification of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Unauthorized,
    Authorized,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Authorized => "authorized",
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted session state of one account, as observed by watchers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PersistedAccountState {
    #[default]
    Empty,
    AwaitingCode { phone: String },
    Authorized { user_id: i64 },
}

impl PersistedAccountState {
    pub fn kind(&self) -> AccountKind {
        match self {
            Self::Authorized { .. } => AccountKind::Authorized,
            Self::Empty | Self::AwaitingCode { .. } => AccountKind::Unauthorized,
        }
    }
}

/// Whether a session keeps its background machinery running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundTaskMode {
    Always,
    Never,
}
