//! Almanax dataset records.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Localized text keyed by language code (`en`, `fr`, ...).
pub type Localized = BTreeMap<String, String>;

/// One almanax entry of the upstream dataset.
///
/// `offering_receiver` is the stable key. `days` is filled in by the mapping
/// pass. Fields this crate does not know about are kept in `extra` so a
/// republished artifact is the input plus its days.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlmanaxRecord {
    /// Name of the NPC receiving the offering
    pub offering_receiver: String,

    /// Dates (`YYYY-MM-DD`) resolved to this receiver
    #[serde(default, deserialize_with = "null_as_default")]
    pub days: Vec<String>,

    /// Item to offer
    #[serde(default)]
    pub offering: Offering,

    /// Bonus description per language
    #[serde(default, deserialize_with = "null_as_default")]
    pub bonus: Localized,

    /// Bonus type per language
    #[serde(default, deserialize_with = "null_as_default")]
    pub bonus_type: Localized,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The item offered on a given day.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    #[serde(default, deserialize_with = "null_as_default")]
    pub item_name: Localized,

    #[serde(default)]
    pub quantity: u32,

    #[serde(default)]
    pub image_urls: ImageUrls,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Image references for the offered item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageUrls {
    #[serde(default)]
    pub icon: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AlmanaxRecord {
    /// Whether at least one non-empty day is already attached.
    pub fn has_days(&self) -> bool {
        self.days.iter().any(|day| !day.is_empty())
    }

    /// Localized text for a language, empty if missing.
    pub fn bonus_in(&self, language: &str) -> &str {
        self.bonus.get(language).map(String::as_str).unwrap_or("")
    }

    pub fn bonus_type_in(&self, language: &str) -> &str {
        self.bonus_type.get(language).map(String::as_str).unwrap_or("")
    }

    pub fn item_name_in(&self, language: &str) -> &str {
        self.offering
            .item_name
            .get(language)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Upstream writes unset lists and maps as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fail if two records share the same offering receiver.
pub fn ensure_unique_receivers(records: &[AlmanaxRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.offering_receiver.as_str()) {
            return Err(AppError::DuplicateReceiver(record.offering_receiver.clone()));
        }
    }
    Ok(())
}
