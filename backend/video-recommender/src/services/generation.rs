use crate::models::{ItemId, Recommendation, UserId};
use crate::services::interactions::InteractionMatrix;
use crate::services::Recommender;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::info;

/// Candidates fetched per requested slot when the caller filters history.
const HISTORY_OVERFETCH: usize = 3;

/// Build the recommendation table for a set of test users.
///
/// With `history`, each user's list is drawn from `3 * n` candidates and
/// items the user already interacted with are dropped. Users the engine
/// does not know produce no rows. Output follows the order of `users`.
pub fn generate(
    engine: &dyn Recommender,
    users: &[UserId],
    n: usize,
    history: Option<&InteractionMatrix>,
) -> Vec<Recommendation> {
    let per_user: Vec<Vec<Recommendation>> = users
        .par_iter()
        .map(|&user_id| {
            if !engine.knows_user(user_id) {
                return Vec::new();
            }
            let items = match history {
                Some(matrix) => {
                    let seen: HashSet<ItemId> = matrix.seen_items(user_id).into_iter().collect();
                    let mut items = engine.recommend(user_id, n.saturating_mul(HISTORY_OVERFETCH));
                    items.retain(|item| !seen.contains(&item.item_id));
                    items.truncate(n);
                    items
                }
                None => engine.recommend(user_id, n),
            };
            Recommendation::ranked(user_id, &items)
        })
        .collect();

    let served = per_user.iter().filter(|rows| !rows.is_empty()).count();
    let rows: Vec<Recommendation> = per_user.into_iter().flatten().collect();

    info!(
        engine = %engine.kind(),
        requested_users = users.len(),
        served_users = served,
        rows = rows.len(),
        "Generated recommendations"
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InteractionRecord, InteractionSource, ScoredItem};
    use crate::services::interactions::{InteractionMatrixBuilder, SourceWeights};
    use crate::services::{EngineKind, MockRecommender};
    use mockall::predicate::eq;

    fn engine() -> MockRecommender {
        let mut mock = MockRecommender::new();
        mock.expect_kind().return_const(EngineKind::Content);
        mock.expect_knows_user().returning(|u| u == 1);
        mock
    }

    #[test]
    fn test_skips_unknown_users() {
        let mut mock = engine();
        mock.expect_recommend()
            .with(eq(1), eq(2))
            .returning(|_, _| vec![ScoredItem { item_id: 5, score: 1.0 }]);

        let rows = generate(&mock, &[1, 2], 2, None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, 1);
        assert_eq!(rows[0].rank, 1);
    }

    #[test]
    fn test_history_filter_overfetches() {
        let records = vec![InteractionRecord {
            user_id: 1,
            item_id: 5,
            timestamp: 0.0,
            play_duration: 1_000.0,
            source: InteractionSource::Small,
        }];
        let history =
            InteractionMatrixBuilder::new(1, SourceWeights::default(), 0.0).build(&records);

        let mut mock = engine();
        mock.expect_recommend().with(eq(1), eq(6)).returning(|_, _| {
            vec![
                ScoredItem { item_id: 5, score: 0.9 },
                ScoredItem { item_id: 6, score: 0.8 },
                ScoredItem { item_id: 7, score: 0.7 },
                ScoredItem { item_id: 8, score: 0.6 },
            ]
        });

        let rows = generate(&mock, &[1], 2, Some(&history));
        let ids: Vec<ItemId> = rows.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![6, 7]);
        assert_eq!(rows[1].rank, 2);
    }
}
