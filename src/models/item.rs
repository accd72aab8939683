use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::outline::PageOutline;
use super::GenerationKind;
use crate::generation::GenerationFailure;
use crate::state_machine::ItemState;

/// Generated content, one variant per generation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPayload {
    Description { text: String },
    Image { image_ref: String, prompt: String },
}

impl ItemPayload {
    pub fn kind(&self) -> GenerationKind {
        match self {
            Self::Description { .. } => GenerationKind::Description,
            Self::Image { .. } => GenerationKind::Image,
        }
    }

    pub fn description(text: impl Into<String>) -> Self {
        Self::Description { text: text.into() }
    }

    pub fn image(image_ref: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::Image {
            image_ref: image_ref.into(),
            prompt: prompt.into(),
        }
    }
}

/// A page within a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub container_id: Uuid,
    /// Stable ordering key; gaps are allowed after edits
    pub position: i32,
    pub outline: PageOutline,
    pub payloads: BTreeMap<GenerationKind, ItemPayload>,
    pub state: ItemState,
    /// Kind of the generation the current state refers to
    pub active_kind: Option<GenerationKind>,
    /// Failure of the latest generation, cleared on success
    pub last_failure: Option<GenerationFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(container_id: Uuid, position: i32, outline: PageOutline) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            container_id,
            position,
            outline,
            payloads: BTreeMap::new(),
            state: ItemState::default(),
            active_kind: None,
            last_failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_payload(&self, kind: GenerationKind) -> bool {
        self.payloads.contains_key(&kind)
    }

    pub fn payload(&self, kind: GenerationKind) -> Option<&ItemPayload> {
        self.payloads.get(&kind)
    }

    /// Description text, if one has been generated
    pub fn description_text(&self) -> Option<&str> {
        match self.payloads.get(&GenerationKind::Description) {
            Some(ItemPayload::Description { text }) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Reference of the current image, if one has been generated
    pub fn image_ref(&self) -> Option<&str> {
        match self.payloads.get(&GenerationKind::Image) {
            Some(ItemPayload::Image { image_ref, .. }) => Some(image_ref.as_str()),
            _ => None,
        }
    }

    /// Item-level prompt context; `page_index` is the 1-based position in the deck
    pub fn context(&self, page_index: usize) -> ItemContext {
        ItemContext {
            item_id: self.id,
            position: self.position,
            page_index,
            outline: self.outline.clone(),
            description: self.description_text().map(str::to_string),
            image_ref: self.image_ref().map(str::to_string),
        }
    }
}

/// Snapshot of item data needed to build a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemContext {
    pub item_id: Uuid,
    pub position: i32,
    pub page_index: usize,
    pub outline: PageOutline,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kind_and_tagging() {
        let payload = ItemPayload::image("s3://deck/1.png", "a chart");
        assert_eq!(payload.kind(), GenerationKind::Image);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["image_ref"], "s3://deck/1.png");
    }

    #[test]
    fn test_context_carries_description() {
        let mut item = Item::new(Uuid::new_v4(), 10, PageOutline::new("Intro", vec![]));
        assert!(item.context(1).description.is_none());

        item.payloads.insert(
            GenerationKind::Description,
            ItemPayload::description("Welcome slide"),
        );
        let context = item.context(1);
        assert_eq!(context.description.as_deref(), Some("Welcome slide"));
        assert_eq!(context.position, 10);
        assert_eq!(context.page_index, 1);
        assert!(context.image_ref.is_none());

        item.payloads.insert(
            GenerationKind::Image,
            ItemPayload::image("mem://1.png", "p"),
        );
        assert_eq!(item.context(1).image_ref.as_deref(), Some("mem://1.png"));
    }
}
