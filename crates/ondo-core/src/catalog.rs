//! Evaluation item catalog.
//!
//! The catalog is reference data: it is seeded once and never mutated by the
//! evaluation flow. [`DEFAULT_ITEMS`] lists the dimensions seeded into a fresh
//! database.

use std::collections::HashMap;

use crate::NEUTRAL_SCORE;
use crate::model::{EvaluationItem, ItemId, ItemScore};

/// Seed definition for one catalog item.
#[derive(Debug, Clone, Copy)]
pub struct ItemSeed {
    pub code: &'static str,
    pub display_name: &'static str,
    pub scale_min: i32,
    pub scale_max: i32,
}

/// Items seeded into every database.
pub const DEFAULT_ITEMS: &[ItemSeed] = &[
    ItemSeed {
        code: "communication",
        display_name: "Communication",
        scale_min: 1,
        scale_max: 5,
    },
    ItemSeed {
        code: "collaboration",
        display_name: "Collaboration",
        scale_min: 1,
        scale_max: 5,
    },
    ItemSeed {
        code: "responsibility",
        display_name: "Responsibility",
        scale_min: 1,
        scale_max: 5,
    },
    ItemSeed {
        code: "punctuality",
        display_name: "Punctuality",
        scale_min: 1,
        scale_max: 5,
    },
    ItemSeed {
        code: "expertise",
        display_name: "Expertise",
        scale_min: 1,
        scale_max: 5,
    },
];

/// In-memory view of the item catalog, ordered by item id.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: Vec<EvaluationItem>,
    by_id: HashMap<ItemId, usize>,
}

impl ItemCatalog {
    pub fn new(mut items: Vec<EvaluationItem>) -> Self {
        items.sort_by_key(|item| item.id);
        let by_id = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.id, idx))
            .collect();
        Self { items, by_id }
    }

    pub fn get(&self, id: ItemId) -> Option<&EvaluationItem> {
        self.by_id.get(&id).map(|&idx| &self.items[idx])
    }

    pub fn items(&self) -> &[EvaluationItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// One neutral score per catalog item.
    ///
    /// Used both when a submission carries no item scores and when the
    /// closer fills a missing pair.
    pub fn neutral_scores(&self) -> Vec<ItemScore> {
        self.items
            .iter()
            .map(|item| ItemScore::new(item.id, NEUTRAL_SCORE))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ItemCatalog {
        ItemCatalog::new(vec![
            EvaluationItem::new(2, "collaboration", "Collaboration", 1, 5).unwrap(),
            EvaluationItem::new(1, "communication", "Communication", 1, 5).unwrap(),
        ])
    }

    #[test]
    fn test_default_items_are_valid() {
        for (idx, seed) in DEFAULT_ITEMS.iter().enumerate() {
            let item = EvaluationItem::new(
                idx as ItemId,
                seed.code,
                seed.display_name,
                seed.scale_min,
                seed.scale_max,
            );
            assert!(item.is_ok(), "invalid seed item {}", seed.code);
            assert!(item.unwrap().accepts(NEUTRAL_SCORE));
        }
    }

    #[test]
    fn test_catalog_lookup_and_order() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.items()[0].code, "communication");
        assert_eq!(catalog.get(2).unwrap().code, "collaboration");
        assert!(catalog.get(99).is_none());
    }

    #[test]
    fn test_neutral_scores_cover_every_item() {
        let scores = catalog().neutral_scores();
        assert_eq!(
            scores,
            vec![ItemScore::new(1, NEUTRAL_SCORE), ItemScore::new(2, NEUTRAL_SCORE)]
        );
        assert!(ItemCatalog::default().neutral_scores().is_empty());
    }
}
