//! Per-viewer interaction state and cleanup of polymorphic rows.

use crate::comment::comment_count;
use crate::content::{ContentKind, Target};
use crate::favorite::{favorite_count, is_favorited};
use crate::orm::{comments, favorites, votes};
use crate::vote::user_vote;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use serde::Serialize;

/// What a show page needs to render vote and favorite controls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionState {
    pub vote_score: i32,
    pub user_vote: Option<i32>,
    pub is_favorited: bool,
    pub favorite_count: u64,
    pub comment_count: u64,
}

pub async fn interaction_state<C: ConnectionTrait>(
    db: &C,
    target: Target,
    vote_score: i32,
    viewer: Option<i32>,
) -> Result<InteractionState, DbErr> {
    let (user_vote, is_favorited) = match viewer {
        Some(user_id) => (
            user_vote(db, user_id, target).await?,
            is_favorited(db, user_id, target).await?,
        ),
        None => (None, false),
    };

    Ok(InteractionState {
        vote_score,
        user_vote,
        is_favorited,
        favorite_count: favorite_count(db, target).await?,
        comment_count: comment_count(db, target).await?,
    })
}

/// Deletes the votes, favorites and comments attached to `target`,
/// including votes cast on those comments.
pub async fn purge_interactions<C: ConnectionTrait>(db: &C, target: Target) -> Result<(), DbErr> {
    let comment_ids: Vec<i32> = comments::Entity::find()
        .select_only()
        .column(comments::Column::Id)
        .filter(comments::Column::CommentableType.eq(target.kind))
        .filter(comments::Column::CommentableId.eq(target.id))
        .into_tuple()
        .all(db)
        .await?;

    if !comment_ids.is_empty() {
        votes::Entity::delete_many()
            .filter(votes::Column::VotableType.eq(ContentKind::Comment))
            .filter(votes::Column::VotableId.is_in(comment_ids.clone()))
            .exec(db)
            .await?;
        comments::Entity::delete_many()
            .filter(comments::Column::Id.is_in(comment_ids))
            .exec(db)
            .await?;
    }

    votes::Entity::delete_many()
        .filter(votes::Column::VotableType.eq(target.kind))
        .filter(votes::Column::VotableId.eq(target.id))
        .exec(db)
        .await?;
    favorites::Entity::delete_many()
        .filter(favorites::Column::FavoritableType.eq(target.kind))
        .filter(favorites::Column::FavoritableId.eq(target.id))
        .exec(db)
        .await?;

    Ok(())
}
