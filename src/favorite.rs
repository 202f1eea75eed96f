//! Toggle favoriting over any favoritable target.

use crate::content::{ContentKind, Target};
use crate::error::AppError;
use crate::orm::favorites;
use chrono::prelude::Utc;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr};

/// Favorites `target` for `user_id`, or removes the favorite if it exists.
/// Returns whether the target is favorited afterwards.
pub async fn toggle_favorite(
    db: &DatabaseConnection,
    user_id: i32,
    target: Target,
) -> Result<bool, AppError> {
    target.ensure_exists(db).await?;

    match find_favorite(db, user_id, target).await? {
        Some(favorite) => {
            favorite.delete(db).await?;
            Ok(false)
        }
        None => {
            favorites::ActiveModel {
                user_id: Set(user_id),
                favoritable_type: Set(target.kind),
                favoritable_id: Set(target.id),
                created_at: Set(Utc::now().naive_utc()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(true)
        }
    }
}

pub async fn is_favorited<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    target: Target,
) -> Result<bool, DbErr> {
    Ok(find_favorite(db, user_id, target).await?.is_some())
}

pub async fn favorite_count<C: ConnectionTrait>(db: &C, target: Target) -> Result<u64, DbErr> {
    favorites::Entity::find()
        .filter(favorites::Column::FavoritableType.eq(target.kind))
        .filter(favorites::Column::FavoritableId.eq(target.id))
        .count(db)
        .await
}

/// Ids of every `kind` record the user has favorited, newest first.
pub async fn favorited_ids<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    kind: ContentKind,
) -> Result<Vec<i32>, DbErr> {
    Ok(favorites::Entity::find()
        .filter(favorites::Column::UserId.eq(user_id))
        .filter(favorites::Column::FavoritableType.eq(kind))
        .order_by_desc(favorites::Column::CreatedAt)
        .order_by_desc(favorites::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|f| f.favoritable_id)
        .collect())
}

async fn find_favorite<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    target: Target,
) -> Result<Option<favorites::Model>, DbErr> {
    favorites::Entity::find()
        .filter(favorites::Column::UserId.eq(user_id))
        .filter(favorites::Column::FavoritableType.eq(target.kind))
        .filter(favorites::Column::FavoritableId.eq(target.id))
        .one(db)
        .await
}
