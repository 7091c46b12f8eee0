use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type UserId = i64;
pub type ItemId = i64;

/// Interaction pool a record was logged in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionSource {
    /// Large, sparse logging window
    Big,
    /// Small, dense logging window
    Small,
}

impl InteractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionSource::Big => "big",
            InteractionSource::Small => "small",
        }
    }
}

/// One watch event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Unix seconds
    pub timestamp: f64,
    /// Milliseconds
    pub play_duration: f64,
    pub source: InteractionSource,
}

/// Item tag list as delivered by the metadata table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemMetadata {
    pub item_id: ItemId,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Item with an engine score, before ranks are assigned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub score: f64,
}

/// One row of the recommendation table. `rank` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Recommendation {
    /// Turn an ordered engine output into table rows for one user.
    pub fn ranked(user_id: UserId, items: &[ScoredItem]) -> Vec<Recommendation> {
        items
            .iter()
            .enumerate()
            .map(|(i, scored)| Recommendation {
                user_id,
                item_id: scored.item_id,
                rank: i + 1,
                score: Some(scored.score),
            })
            .collect()
    }
}

/// Held-out (user, item) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TruthPair {
    pub user_id: UserId,
    pub item_id: ItemId,
}

/// Future consumption per user. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    by_user: HashMap<UserId, HashSet<ItemId>>,
    /// Users in first-appearance order
    users: Vec<UserId>,
}

impl GroundTruth {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = TruthPair>,
    {
        let mut truth = GroundTruth::default();
        for pair in pairs {
            truth
                .by_user
                .entry(pair.user_id)
                .or_insert_with(|| {
                    truth.users.push(pair.user_id);
                    HashSet::new()
                })
                .insert(pair.item_id);
        }
        truth
    }

    pub fn items_for(&self, user_id: UserId) -> Option<&HashSet<ItemId>> {
        self.by_user.get(&user_id)
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
