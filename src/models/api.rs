//! Payload exchanged with the downstream almanax API.

use serde::{Deserialize, Serialize};

use super::AlmanaxRecord;

/// One localized almanax day as the downstream API expects it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlmanaxApiEntry {
    pub date: String,
    pub item_quantity: u32,
    #[serde(rename = "item")]
    pub item_name: String,
    #[serde(rename = "description")]
    pub bonus: String,
    #[serde(rename = "bonus")]
    pub bonus_type: String,
    pub language: String,
    pub item_picture_url: String,
}

impl AlmanaxApiEntry {
    /// Build the entry for one date and language from a dataset record.
    pub fn from_record(record: &AlmanaxRecord, date: &str, language: &str) -> Self {
        Self {
            date: date.to_string(),
            item_quantity: record.offering.quantity,
            item_name: record.item_name_in(language).to_string(),
            bonus: record.bonus_in(language).to_string(),
            bonus_type: record.bonus_type_in(language).to_string(),
            language: language.to_string(),
            item_picture_url: record.offering.image_urls.icon.clone(),
        }
    }
}
