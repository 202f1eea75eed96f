mod common;

use agentshelf::error::AppError;
use agentshelf::oauth::{link_identity, ProviderProfile};
use agentshelf::orm::user_identities::{self, Provider};
use agentshelf::orm::{sessions, users};
use agentshelf::session::prune_expired_sessions;
use agentshelf::user::{login_user, LoginForm};
use chrono::{Duration, Utc};
use common::*;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

fn profile(id: &str, nickname: &str, email: Option<&str>) -> ProviderProfile {
    ProviderProfile {
        provider_id: id.to_owned(),
        nickname: nickname.to_owned(),
        email: email.map(str::to_owned),
        avatar_url: None,
    }
}

#[actix_rt::test]
async fn test_login_by_name_or_email() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;

    for login in ["alice", "ALICE@example.com"] {
        let form = LoginForm {
            login: login.to_owned(),
            password: "correct horse".to_owned(),
        };
        assert_eq!(login_user(&db, &form).await.unwrap().id, alice.id);
    }

    let wrong = LoginForm {
        login: "alice".to_owned(),
        password: "battery staple".to_owned(),
    };
    assert!(matches!(login_user(&db, &wrong).await, Err(AppError::Validation(_))));
}

#[actix_rt::test]
async fn test_link_identity_by_email_then_identity() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;

    let linked = link_identity(&db, Provider::Github, &profile("77", "alice-gh", Some("Alice@Example.com")))
        .await
        .unwrap();
    assert_eq!(linked.id, alice.id);
    assert_eq!(user_identities::Entity::find().count(&db).await.unwrap(), 1);

    // Same identity again, even with a changed email, resolves to the same user.
    let again = link_identity(&db, Provider::Github, &profile("77", "alice-gh", Some("new@example.com")))
        .await
        .unwrap();
    assert_eq!(again.id, alice.id);
    assert_eq!(user_identities::Entity::find().count(&db).await.unwrap(), 1);
    assert_eq!(users::Entity::find().count(&db).await.unwrap(), 1);
}

#[actix_rt::test]
async fn test_link_identity_creates_unique_username() {
    let db = test_db().await;
    user(&db, "alice").await;

    let created = link_identity(&db, Provider::Gitlab, &profile("9", "alice", None))
        .await
        .unwrap();
    assert_eq!(created.name, "alice-2");
    assert_eq!(created.password, None);

    let third = link_identity(&db, Provider::Github, &profile("10", "alice", None))
        .await
        .unwrap();
    assert_eq!(third.name, "alice-3");
}

#[actix_rt::test]
async fn test_prune_expired_sessions() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let now = Utc::now().naive_utc();

    for (token, expires_at) in [("old", now - Duration::minutes(5)), ("live", now + Duration::minutes(5))] {
        sessions::ActiveModel {
            id: Set(token.to_owned()),
            user_id: Set(alice.id),
            expires_at: Set(expires_at),
        }
        .insert(&db)
        .await
        .unwrap();
    }

    assert_eq!(prune_expired_sessions(&db).await.unwrap(), 1);
    let left = sessions::Entity::find().all(&db).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, "live");
}
