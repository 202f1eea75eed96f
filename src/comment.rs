//! Comments on commentable targets.

use crate::content::{ContentKind, Target};
use crate::error::AppError;
use crate::orm::{comments, users, votes};
use crate::vote::{sum_votes_for_many, user_votes_for_many};
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, TransactionTrait};
use serde::Serialize;
use std::collections::HashMap;

/// Upper bound on a comment body, in characters.
pub const MAX_BODY_CHARS: usize = 5000;

/// A comment row joined with its author's name.
#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct CommentForTemplate {
    pub id: i32,
    pub user_id: Option<i32>,
    pub parent_id: Option<i32>,
    pub body: String,
    pub is_edited: bool,
    pub edited_at: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    // join users
    pub username: Option<String>,
}

/// A comment with its score, the viewer's vote and its replies.
#[derive(Clone, Debug, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentForTemplate,
    pub vote_score: i32,
    pub user_vote: Option<i32>,
    pub replies: Vec<CommentNode>,
}

/// Trims the body and checks its length.
pub fn validate_body(body: &str) -> Result<String, AppError> {
    let body = body.trim();
    let chars = body.chars().count();

    if chars == 0 {
        return Err(AppError::Validation("The comment body is required.".to_owned()));
    }
    if chars > MAX_BODY_CHARS {
        return Err(AppError::Validation(format!(
            "The comment body may not be greater than {} characters.",
            MAX_BODY_CHARS
        )));
    }

    Ok(body.to_owned())
}

/// Posts a comment on `target`, optionally replying to `parent_id`.
/// A parent must belong to the very same target.
pub async fn create_comment(
    db: &DatabaseConnection,
    user_id: i32,
    target: Target,
    body: &str,
    parent_id: Option<i32>,
) -> Result<comments::Model, AppError> {
    let body = validate_body(body)?;
    target.ensure_exists(db).await?;

    if let Some(parent_id) = parent_id {
        let parent = comments::Entity::find_by_id(parent_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::Validation("The parent comment does not exist.".to_owned()))?;

        if parent.commentable_type != target.kind || parent.commentable_id != target.id {
            return Err(AppError::Validation(
                "The parent comment belongs to a different item.".to_owned(),
            ));
        }
    }

    let now = Utc::now().naive_utc();
    let comment = comments::ActiveModel {
        user_id: Set(Some(user_id)),
        commentable_type: Set(target.kind),
        commentable_id: Set(target.id),
        parent_id: Set(parent_id),
        body: Set(body),
        is_edited: Set(false),
        edited_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(comment)
}

/// Replaces the body of a comment owned by `user_id` and marks it edited.
pub async fn update_comment(
    db: &DatabaseConnection,
    user_id: i32,
    comment_id: i32,
    body: &str,
) -> Result<comments::Model, AppError> {
    let body = validate_body(body)?;
    let comment = find_owned(db, user_id, comment_id, "You do not have permission to edit this comment.").await?;

    let now = Utc::now().naive_utc();
    let mut comment: comments::ActiveModel = comment.into();
    comment.body = Set(body);
    comment.is_edited = Set(true);
    comment.edited_at = Set(Some(now));
    comment.updated_at = Set(now);

    Ok(comment.update(db).await?)
}

/// Deletes a comment owned by `user_id` together with its direct replies.
/// Replies to those replies are left in place.
pub async fn delete_comment(
    db: &DatabaseConnection,
    user_id: i32,
    comment_id: i32,
) -> Result<comments::Model, AppError> {
    let comment = find_owned(db, user_id, comment_id, "You do not have permission to delete this comment.").await?;

    let txn = db.begin().await?;
    let mut doomed: Vec<i32> = comments::Entity::find()
        .select_only()
        .column(comments::Column::Id)
        .filter(comments::Column::ParentId.eq(comment.id))
        .into_tuple()
        .all(&txn)
        .await?;
    doomed.push(comment.id);

    votes::Entity::delete_many()
        .filter(votes::Column::VotableType.eq(ContentKind::Comment))
        .filter(votes::Column::VotableId.is_in(doomed.clone()))
        .exec(&txn)
        .await?;
    comments::Entity::delete_many()
        .filter(comments::Column::Id.is_in(doomed.clone()))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    log::debug!(
        "comment {} deleted with {} direct replies",
        comment.id,
        doomed.len() - 1
    );

    Ok(comment)
}

/// Every comment on `target` arranged as a tree, oldest first.
/// `viewer` fills in `user_vote`.
pub async fn get_comment_tree<C: ConnectionTrait>(
    db: &C,
    target: Target,
    viewer: Option<i32>,
) -> Result<Vec<CommentNode>, DbErr> {
    let rows = comments::Entity::find()
        .left_join(users::Entity)
        .column_as(users::Column::Name, "username")
        .filter(comments::Column::CommentableType.eq(target.kind))
        .filter(comments::Column::CommentableId.eq(target.id))
        .order_by_asc(comments::Column::CreatedAt)
        .order_by_asc(comments::Column::Id)
        .into_model::<CommentForTemplate>()
        .all(db)
        .await?;

    let ids: Vec<i32> = rows.iter().map(|c| c.id).collect();
    let scores = sum_votes_for_many(db, ContentKind::Comment, &ids).await?;
    let votes = match viewer {
        Some(user_id) => user_votes_for_many(db, user_id, ContentKind::Comment, &ids).await?,
        None => HashMap::new(),
    };

    let nodes = rows
        .into_iter()
        .map(|comment| CommentNode {
            vote_score: scores.get(&comment.id).copied().unwrap_or(0),
            user_vote: votes.get(&comment.id).copied(),
            comment,
            replies: Vec::new(),
        })
        .collect();

    Ok(build_tree(nodes))
}

pub async fn comment_count<C: ConnectionTrait>(db: &C, target: Target) -> Result<u64, DbErr> {
    comments::Entity::find()
        .filter(comments::Column::CommentableType.eq(target.kind))
        .filter(comments::Column::CommentableId.eq(target.id))
        .count(db)
        .await
}

async fn find_owned(
    db: &DatabaseConnection,
    user_id: i32,
    comment_id: i32,
    denied: &'static str,
) -> Result<comments::Model, AppError> {
    let comment = comments::Entity::find_by_id(comment_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Comment"))?;

    if comment.user_id != Some(user_id) {
        return Err(AppError::Forbidden(denied));
    }

    Ok(comment)
}

/// Nests nodes under their parents, keeping input order among siblings.
/// Nodes whose parent is absent from `nodes` are dropped.
fn build_tree(nodes: Vec<CommentNode>) -> Vec<CommentNode> {
    let mut children: HashMap<Option<i32>, Vec<CommentNode>> = HashMap::new();
    for node in nodes {
        children.entry(node.comment.parent_id).or_default().push(node);
    }

    fn attach(
        parent: Option<i32>,
        children: &mut HashMap<Option<i32>, Vec<CommentNode>>,
    ) -> Vec<CommentNode> {
        let mut level = children.remove(&parent).unwrap_or_default();
        for node in level.iter_mut() {
            node.replies = attach(Some(node.comment.id), children);
        }
        level
    }

    attach(None, &mut children)
}
