//! Card (chip) metadata declared by packages.

use super::enums::{CardClass, Element};
use crate::core::handle::NativeType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardProperties {
    pub short_name: String,
    pub description: String,
    pub code: String,
    pub damage: i64,
    pub element: Element,
    pub secondary_element: Element,
    pub card_class: CardClass,
    pub time_freeze: bool,
    pub can_boost: bool,
    /// Copies allowed per folder.
    pub limit: u32,
}

impl Default for CardProperties {
    fn default() -> Self {
        Self {
            short_name: String::new(),
            description: String::new(),
            code: "*".to_string(),
            damage: 0,
            element: Element::None,
            secondary_element: Element::None,
            card_class: CardClass::Standard,
            time_freeze: false,
            can_boost: true,
            limit: 5,
        }
    }
}

impl NativeType for CardProperties {
    const TYPE_NAME: &'static str = "CardProperties";
}
