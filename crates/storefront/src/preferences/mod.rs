//! Change Tracker and the durable store behind it
//!
//! The tracker is the single writer of `UserData`. The watermark it exposes is
//! stored in the catalog database so the sync engine can advance it inside the
//! data transaction.

mod change_tracker;
mod preferences_store;

pub use change_tracker::ChangeTracker;
pub use preferences_store::{InMemoryPreferencesStore, JsonFilePreferencesStore, PreferencesStore};

#[cfg(test)]
#[path = "preferences_tests.rs"]
mod tests;
