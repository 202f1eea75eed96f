//! Toggle voting over any votable target.

use crate::content::{store_vote_score, ContentKind, Target};
use crate::error::AppError;
use crate::orm::{configs, mcp_servers, prompts, skills, votes};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, sea_query::Expr};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, TransactionTrait};
use serde::Serialize;
use std::collections::HashMap;

/// A validated vote direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            _ => Err(AppError::Validation(
                "The vote value must be either 1 or -1.".to_owned(),
            )),
        }
    }
}

/// Wire response of the vote endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    pub vote_score: i32,
    pub user_vote: Option<i32>,
}

#[derive(Debug, FromQueryResult)]
struct VoteSum {
    score: Option<i64>,
}

#[derive(Debug, FromQueryResult)]
struct GroupedVoteSum {
    votable_id: i32,
    score: Option<i64>,
}

/// Applies a vote from `user_id` to `target`.
///
/// No standing vote inserts one; a repeat of the standing value removes it;
/// the opposite value flips it. The new sum is written to the target's
/// `vote_score` in the same transaction.
pub async fn toggle_vote(
    db: &DatabaseConnection,
    user_id: i32,
    target: Target,
    value: VoteValue,
) -> Result<VoteOutcome, AppError> {
    target.ensure_exists(db).await?;

    let value = value.as_i32();
    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;

    let existing = votes::Entity::find()
        .filter(votes::Column::UserId.eq(user_id))
        .filter(votes::Column::VotableType.eq(target.kind))
        .filter(votes::Column::VotableId.eq(target.id))
        .one(&txn)
        .await?;

    let user_vote = match existing {
        None => {
            votes::ActiveModel {
                user_id: Set(user_id),
                votable_type: Set(target.kind),
                votable_id: Set(target.id),
                value: Set(value),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            Some(value)
        }
        Some(vote) if vote.value == value => {
            vote.delete(&txn).await?;
            None
        }
        Some(vote) => {
            let mut vote: votes::ActiveModel = vote.into();
            vote.value = Set(value);
            vote.updated_at = Set(now);
            vote.update(&txn).await?;
            Some(value)
        }
    };

    let vote_score = sum_votes(&txn, target).await?;
    persist_vote_score(&txn, target, vote_score).await?;
    txn.commit().await?;

    log::debug!(
        "user {} voted {:?} on {} {}; score is now {}",
        user_id,
        user_vote,
        target.kind.tag(),
        target.id,
        vote_score
    );

    Ok(VoteOutcome {
        vote_score,
        user_vote,
    })
}

/// Sum of all standing votes on `target`.
pub async fn sum_votes<C: ConnectionTrait>(db: &C, target: Target) -> Result<i32, DbErr> {
    let sum = votes::Entity::find()
        .select_only()
        .column_as(Expr::col(votes::Column::Value).sum(), "score")
        .filter(votes::Column::VotableType.eq(target.kind))
        .filter(votes::Column::VotableId.eq(target.id))
        .into_model::<VoteSum>()
        .one(db)
        .await?;

    Ok(sum.and_then(|s| s.score).unwrap_or(0) as i32)
}

/// Vote sums for many targets of one kind, keyed by id. Missing ids have no votes.
pub async fn sum_votes_for_many<C: ConnectionTrait>(
    db: &C,
    kind: ContentKind,
    ids: &[i32],
) -> Result<HashMap<i32, i32>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sums = votes::Entity::find()
        .select_only()
        .column(votes::Column::VotableId)
        .column_as(Expr::col(votes::Column::Value).sum(), "score")
        .filter(votes::Column::VotableType.eq(kind))
        .filter(votes::Column::VotableId.is_in(ids.iter().copied()))
        .group_by(votes::Column::VotableId)
        .into_model::<GroupedVoteSum>()
        .all(db)
        .await?;

    Ok(sums
        .into_iter()
        .map(|s| (s.votable_id, s.score.unwrap_or(0) as i32))
        .collect())
}

/// The caller's standing vote on `target`, if any.
pub async fn user_vote<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    target: Target,
) -> Result<Option<i32>, DbErr> {
    Ok(votes::Entity::find()
        .filter(votes::Column::UserId.eq(user_id))
        .filter(votes::Column::VotableType.eq(target.kind))
        .filter(votes::Column::VotableId.eq(target.id))
        .one(db)
        .await?
        .map(|vote| vote.value))
}

/// The caller's standing votes on many targets of one kind, keyed by id.
pub async fn user_votes_for_many<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    kind: ContentKind,
    ids: &[i32],
) -> Result<HashMap<i32, i32>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Ok(votes::Entity::find()
        .filter(votes::Column::UserId.eq(user_id))
        .filter(votes::Column::VotableType.eq(kind))
        .filter(votes::Column::VotableId.is_in(ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|vote| (vote.votable_id, vote.value))
        .collect())
}

async fn persist_vote_score<C: ConnectionTrait>(
    db: &C,
    target: Target,
    score: i32,
) -> Result<(), DbErr> {
    match target.kind {
        ContentKind::Config => store_vote_score::<configs::Entity, _>(db, target.id, score).await,
        ContentKind::McpServer => {
            store_vote_score::<mcp_servers::Entity, _>(db, target.id, score).await
        }
        ContentKind::Prompt => store_vote_score::<prompts::Entity, _>(db, target.id, score).await,
        ContentKind::Skill => store_vote_score::<skills::Entity, _>(db, target.id, score).await,
        // Comment scores are summed when comments are listed.
        ContentKind::Comment => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_value_range() {
        assert_eq!(VoteValue::try_from(1).unwrap(), VoteValue::Up);
        assert_eq!(VoteValue::try_from(-1).unwrap(), VoteValue::Down);
        for bad in [0, 2, -2, 100, i64::MIN] {
            assert!(matches!(
                VoteValue::try_from(bad),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_outcome_wire_shape() {
        let json = serde_json::to_value(VoteOutcome {
            vote_score: 3,
            user_vote: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "vote_score": 3, "user_vote": null }));
    }
}
