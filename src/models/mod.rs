// src/models/mod.rs

pub mod analytics;
pub mod chat;
pub mod question;
pub mod quiz;
pub mod submission;
pub mod user;

use serde::{Deserialize, Deserializer};

/// For nullable columns in partial updates: an absent field stays `None`,
/// an explicit `null` becomes `Some(None)` and clears the column.
/// Use together with `#[serde(default)]`.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
