mod common;

use agentshelf::comment::{create_comment, delete_comment, get_comment_tree, update_comment, MAX_BODY_CHARS};
use agentshelf::config::{delete_config, get_config_files, list_configs, update_config, ConfigFilter, ConfigFileForm, ConfigForm};
use agentshelf::content::{Actor, ContentKind, Target};
use agentshelf::error::AppError;
use agentshelf::favorite::{favorite_count, favorited_ids, toggle_favorite};
use agentshelf::interaction::interaction_state;
use agentshelf::listing::{clamp_page, Sort};
use agentshelf::orm::{comments, configs, votes};
use agentshelf::taxonomy::delete_config_type;
use agentshelf::vote::{sum_votes, toggle_vote, VoteValue};
use common::*;
use sea_orm::{EntityTrait, PaginatorTrait};

async fn stored_score(db: &sea_orm::DatabaseConnection, id: i32) -> i32 {
    configs::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .vote_score
}

#[actix_rt::test]
async fn test_vote_score_tracks_votes() {
    let db = test_db().await;
    let (alice, bob, carol) = (user(&db, "alice").await, user(&db, "bob").await, user(&db, "carol").await);
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let config = config(&db, &alice, &agent, &rules, "Terse rules").await;
    let target = Target::new(ContentKind::Config, config.id);

    let steps = [
        (alice.id, VoteValue::Up),
        (bob.id, VoteValue::Up),
        (carol.id, VoteValue::Down),
        (bob.id, VoteValue::Down),
        (alice.id, VoteValue::Up),
        (carol.id, VoteValue::Up),
    ];
    for (user_id, value) in steps {
        let outcome = toggle_vote(&db, user_id, target, value).await.unwrap();
        assert_eq!(outcome.vote_score, sum_votes(&db, target).await.unwrap());
        assert_eq!(outcome.vote_score, stored_score(&db, config.id).await);
    }
    // alice withdrew, bob is down, carol flipped up
    assert_eq!(stored_score(&db, config.id).await, 0);
}

#[actix_rt::test]
async fn test_same_vote_twice_withdraws() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let config = config(&db, &alice, &agent, &rules, "Terse rules").await;
    let target = Target::new(ContentKind::Config, config.id);

    let first = toggle_vote(&db, alice.id, target, VoteValue::Up).await.unwrap();
    assert_eq!((first.vote_score, first.user_vote), (1, Some(1)));

    let second = toggle_vote(&db, alice.id, target, VoteValue::Up).await.unwrap();
    assert_eq!((second.vote_score, second.user_vote), (0, None));
    assert_eq!(votes::Entity::find().count(&db).await.unwrap(), 0);

    let down = toggle_vote(&db, alice.id, target, VoteValue::Down).await.unwrap();
    assert_eq!((down.vote_score, down.user_vote), (-1, Some(-1)));

    let flipped = toggle_vote(&db, alice.id, target, VoteValue::Up).await.unwrap();
    assert_eq!((flipped.vote_score, flipped.user_vote), (1, Some(1)));
    assert_eq!(votes::Entity::find().count(&db).await.unwrap(), 1);
}

#[actix_rt::test]
async fn test_vote_on_missing_target() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let result = toggle_vote(&db, alice.id, Target::new(ContentKind::Skill, 404), VoteValue::Up).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[actix_rt::test]
async fn test_reply_must_share_target() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let one = config(&db, &alice, &agent, &rules, "One").await;
    let two = config(&db, &alice, &agent, &rules, "Two").await;
    let on_one = Target::new(ContentKind::Config, one.id);
    let on_two = Target::new(ContentKind::Config, two.id);

    let parent = create_comment(&db, alice.id, on_one, "first", None).await.unwrap();
    let stray = create_comment(&db, alice.id, on_two, "reply", Some(parent.id)).await;
    assert!(matches!(stray, Err(AppError::Validation(_))));

    let reply = create_comment(&db, alice.id, on_one, "reply", Some(parent.id)).await.unwrap();
    let tree = get_comment_tree(&db, on_one, None).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].replies.len(), 1);
    assert_eq!(tree[0].replies[0].comment.id, reply.id);
}

#[actix_rt::test]
async fn test_delete_comment_removes_direct_replies() {
    let db = test_db().await;
    let (alice, bob) = (user(&db, "alice").await, user(&db, "bob").await);
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let config = config(&db, &alice, &agent, &rules, "Terse rules").await;
    let target = Target::new(ContentKind::Config, config.id);

    let parent = create_comment(&db, alice.id, target, "parent", None).await.unwrap();
    let r1 = create_comment(&db, bob.id, target, "r1", Some(parent.id)).await.unwrap();
    create_comment(&db, bob.id, target, "r2", Some(parent.id)).await.unwrap();
    let other = create_comment(&db, bob.id, target, "other", None).await.unwrap();
    toggle_vote(&db, alice.id, Target::new(ContentKind::Comment, r1.id), VoteValue::Up)
        .await
        .unwrap();

    let denied = delete_comment(&db, bob.id, parent.id).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    delete_comment(&db, alice.id, parent.id).await.unwrap();
    let left: Vec<i32> = comments::Entity::find()
        .all(&db)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(left, vec![other.id]);
    assert_eq!(votes::Entity::find().count(&db).await.unwrap(), 0);
}

#[actix_rt::test]
async fn test_update_comment_marks_edit() {
    let db = test_db().await;
    let (alice, bob) = (user(&db, "alice").await, user(&db, "bob").await);
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let config = config(&db, &alice, &agent, &rules, "Terse rules").await;
    let target = Target::new(ContentKind::Config, config.id);
    let comment = create_comment(&db, alice.id, target, "first", None).await.unwrap();
    assert!(!comment.is_edited);
    assert!(comment.edited_at.is_none());

    let denied = update_comment(&db, bob.id, comment.id, "hijacked").await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let too_long = "a".repeat(MAX_BODY_CHARS + 1);
    let rejected = update_comment(&db, alice.id, comment.id, &too_long).await;
    assert!(matches!(rejected, Err(AppError::Validation(_))));
    let blank = update_comment(&db, alice.id, comment.id, "   ").await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let edited = update_comment(&db, alice.id, comment.id, "  edited ").await.unwrap();
    assert_eq!(edited.body, "edited");
    assert!(edited.is_edited);
    assert!(edited.edited_at.is_some());

    let stored = comments::Entity::find_by_id(comment.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.body, "edited");
    assert!(stored.is_edited);
}

#[actix_rt::test]
async fn test_favorite_toggles() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let server = local_server(&db, &alice, "Pkg Server").await;
    let target = Target::new(ContentKind::McpServer, server.id);

    assert!(toggle_favorite(&db, alice.id, target).await.unwrap());
    assert_eq!(favorite_count(&db, target).await.unwrap(), 1);
    assert_eq!(
        favorited_ids(&db, alice.id, ContentKind::McpServer).await.unwrap(),
        vec![server.id]
    );

    assert!(!toggle_favorite(&db, alice.id, target).await.unwrap());
    assert_eq!(favorite_count(&db, target).await.unwrap(), 0);
}

#[actix_rt::test]
async fn test_interaction_state_for_viewer() {
    let db = test_db().await;
    let (alice, bob) = (user(&db, "alice").await, user(&db, "bob").await);
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let config = config(&db, &alice, &agent, &rules, "Terse rules").await;
    let target = Target::new(ContentKind::Config, config.id);

    toggle_vote(&db, bob.id, target, VoteValue::Down).await.unwrap();
    toggle_favorite(&db, bob.id, target).await.unwrap();
    create_comment(&db, alice.id, target, "hello", None).await.unwrap();

    let score = stored_score(&db, config.id).await;
    let state = interaction_state(&db, target, score, Some(bob.id)).await.unwrap();
    assert_eq!(state.vote_score, -1);
    assert_eq!(state.user_vote, Some(-1));
    assert!(state.is_favorited);
    assert_eq!(state.favorite_count, 1);
    assert_eq!(state.comment_count, 1);

    let guest = interaction_state(&db, target, score, None).await.unwrap();
    assert_eq!(guest.user_vote, None);
    assert!(!guest.is_favorited);
}

fn edit_form(agent_id: i32, config_type_id: i32) -> ConfigForm {
    ConfigForm {
        title: "Renamed".to_owned(),
        description: Some("now with two files".to_owned()),
        agent_id,
        config_type_id,
        category_id: None,
        files: vec![
            ConfigFileForm {
                filename: "a.md".to_owned(),
                content: "a".to_owned(),
                language: None,
                is_primary: false,
            },
            ConfigFileForm {
                filename: "b.md".to_owned(),
                content: "b".to_owned(),
                language: None,
                is_primary: true,
            },
        ],
    }
}

#[actix_rt::test]
async fn test_only_owner_or_admin_edits() {
    let db = test_db().await;
    let (alice, bob) = (user(&db, "alice").await, user(&db, "bob").await);
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let config = config(&db, &alice, &agent, &rules, "Terse rules").await;
    let form = edit_form(agent.id, rules.id);

    let intruder = Actor { user_id: bob.id, is_admin: false };
    assert!(matches!(
        update_config(&db, intruder, config.id, &form).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        delete_config(&db, intruder, config.id).await,
        Err(AppError::Forbidden(_))
    ));

    let admin = Actor { user_id: bob.id, is_admin: true };
    let updated = update_config(&db, admin, config.id, &form).await.unwrap();
    assert_eq!(updated.slug, "renamed");
    let files = get_config_files(&db, config.id).await.unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[1].is_primary && !files[0].is_primary);
}

#[actix_rt::test]
async fn test_delete_config_purges_interactions() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let config = config(&db, &alice, &agent, &rules, "Terse rules").await;
    let target = Target::new(ContentKind::Config, config.id);
    toggle_vote(&db, alice.id, target, VoteValue::Up).await.unwrap();
    toggle_favorite(&db, alice.id, target).await.unwrap();
    create_comment(&db, alice.id, target, "mine", None).await.unwrap();

    let owner = Actor { user_id: alice.id, is_admin: false };
    delete_config(&db, owner, config.id).await.unwrap();

    assert_eq!(votes::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(comments::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(favorite_count(&db, target).await.unwrap(), 0);
}

#[actix_rt::test]
async fn test_slugs_stay_unique_and_listing_filters() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    let hooks = config_type(&db, "Hooks").await;
    let first = config(&db, &alice, &agent, &rules, "Same Title").await;
    let second = config(&db, &alice, &agent, &hooks, "Same Title").await;
    assert_eq!(first.slug, "same-title");
    assert_eq!(second.slug, "same-title-2");

    let filter = ConfigFilter {
        config_type_id: Some(hooks.id),
        ..Default::default()
    };
    let page = list_configs(&db, &filter, Sort::New, 1, 10).await.unwrap();
    assert_eq!(page.meta.total, 1);
    assert_eq!(page.data[0].config_type_slug.as_deref(), Some("hooks"));
    assert_eq!(page.data[0].username.as_deref(), Some("alice"));

    delete_config_type(&db, hooks.id).await.unwrap();
    assert_eq!(configs::Entity::find().count(&db).await.unwrap(), 1);
}

#[actix_rt::test]
async fn test_page_past_the_end_yields_last_page() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    for title in ["One", "Two", "Three"] {
        config(&db, &alice, &agent, &rules, title).await;
    }

    let filter = ConfigFilter::default();
    let page = list_configs(&db, &filter, Sort::New, clamp_page(Some(i64::MAX)), 2)
        .await
        .unwrap();
    assert_eq!(page.meta.last_page, 2);
    assert_eq!(page.meta.current_page, 2);
    assert_eq!(page.data.len(), 1);

    let empty = list_configs(&db, &filter, Sort::New, u64::MAX, 20).await.unwrap();
    assert_eq!(empty.meta.current_page, 1);
    assert_eq!(empty.data.len(), 3);
}

#[actix_rt::test]
async fn test_search_treats_wildcards_literally() {
    let db = test_db().await;
    let alice = user(&db, "alice").await;
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    config(&db, &alice, &agent, &rules, "Plain rules").await;
    config(&db, &alice, &agent, &rules, "100% coverage").await;

    let search = |q: &str| ConfigFilter {
        search: Some(q.to_owned()),
        ..Default::default()
    };
    let percent = list_configs(&db, &search("%"), Sort::New, 1, 20).await.unwrap();
    assert_eq!(percent.meta.total, 1);
    assert_eq!(percent.data[0].title, "100% coverage");

    let underscore = list_configs(&db, &search("_"), Sort::New, 1, 20).await.unwrap();
    assert_eq!(underscore.meta.total, 0);

    let word = list_configs(&db, &search("RULES"), Sort::New, 1, 20).await.unwrap();
    assert_eq!(word.meta.total, 1);
}
