//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Calendar events, keyed by `{user_id}_{google_event_id}`
    pub const EVENTS: &str = "events";
}
