//! Database-backed login sessions. The signed cookie carries only the token.

use crate::global::get_settings;
use crate::orm::sessions;
use crate::user::{get_client_user, ClientUser};
use actix_session::Session;
use chrono::Utc;
use sea_orm::{entity::*, ConnectionTrait, DbErr, QueryFilter};
use uuid::Uuid;

/// Cookie session key holding the session token.
pub const TOKEN_KEY: &str = "token";

/// Starts a session for `user_id` and stores its token in the cookie.
pub async fn new_session<C: ConnectionTrait>(
    db: &C,
    cookies: &Session,
    user_id: i32,
) -> Result<Uuid, DbErr> {
    prune_expired_sessions(db).await?;

    let uuid = Uuid::new_v4();
    sessions::ActiveModel {
        id: Set(uuid.to_string()),
        user_id: Set(user_id),
        expires_at: Set(Utc::now().naive_utc() + get_settings().session_time),
    }
    .insert(db)
    .await?;

    cookies.renew();
    if let Err(e) = cookies.insert(TOKEN_KEY, uuid.to_string()) {
        log::error!("new_session: unable to write token to cookie: {}", e);
    }

    Ok(uuid)
}

fn session_token(cookies: &Session) -> Option<String> {
    match cookies.get::<String>(TOKEN_KEY) {
        Ok(token) => token,
        Err(e) => {
            log::warn!("session_token: unreadable cookie: {}", e);
            None
        }
    }
}

/// Resolves the cookie token to a user. Expired sessions are deleted.
pub async fn authenticate_client_by_session<C: ConnectionTrait>(
    db: &C,
    cookies: &Session,
) -> Result<Option<ClientUser>, DbErr> {
    let token = match session_token(cookies) {
        Some(token) => token,
        None => return Ok(None),
    };

    let session = match sessions::Entity::find_by_id(token).one(db).await? {
        Some(session) => session,
        None => return Ok(None),
    };

    if session.expires_at <= Utc::now().naive_utc() {
        log::debug!("session for user {} expired", session.user_id);
        sessions::Entity::delete_by_id(session.id).exec(db).await?;
        return Ok(None);
    }

    get_client_user(db, session.user_id).await
}

/// Deletes the session row and clears the cookie.
pub async fn remove_session<C: ConnectionTrait>(db: &C, cookies: &Session) -> Result<(), DbErr> {
    if let Some(token) = session_token(cookies) {
        sessions::Entity::delete_by_id(token).exec(db).await?;
    }
    cookies.purge();
    Ok(())
}

pub async fn prune_expired_sessions<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
    let res = sessions::Entity::delete_many()
        .filter(sessions::Column::ExpiresAt.lte(Utc::now().naive_utc()))
        .exec(db)
        .await?;
    if res.rows_affected > 0 {
        log::info!("pruned {} expired sessions", res.rows_affected);
    }
    Ok(res.rows_affected)
}
