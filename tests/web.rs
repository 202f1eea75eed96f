mod common;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Cookie, Key};
use actix_web::http::{header, StatusCode};
use actix_web::middleware::ErrorHandlers;
use actix_web::web::Data;
use actix_web::{test, App};
use agentshelf::middleware::ClientCtx;
use common::*;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

macro_rules! app {
    ($db:expr) => {
        test::init_service(
            App::new()
                .app_data(Data::new($db.clone()))
                .wrap(
                    ErrorHandlers::new()
                        .handler(StatusCode::NOT_FOUND, agentshelf::web::error::render_404)
                        .handler(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            agentshelf::web::error::render_500,
                        ),
                )
                .wrap(ClientCtx::default())
                .wrap(SessionMiddleware::new(
                    CookieSessionStore::default(),
                    Key::from(&[7u8; 64]),
                ))
                .configure(agentshelf::web::configure),
        )
        .await
    };
}

async fn seeded() -> DatabaseConnection {
    let db = test_db().await;
    let owner = user(&db, "owner").await;
    let agent = agent(&db).await;
    let rules = config_type(&db, "Rules").await;
    config(&db, &owner, &agent, &rules, "Terse rules").await;
    local_server(&db, &owner, "Pkg Server").await;
    db
}

#[actix_rt::test]
async fn test_vote_requires_login() {
    let db = seeded().await;
    let app = app!(db);

    let req = test::TestRequest::post()
        .uri("/vote/config/1")
        .set_json(json!({ "value": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_register_then_vote() {
    let db = seeded().await;
    let app = app!(db);

    let req = test::TestRequest::post()
        .uri("/register")
        .set_json(json!({ "name": "voter", "email": "voter@example.com", "password": "hunter22!" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let cookie: Cookie<'static> = resp
        .response()
        .cookies()
        .next()
        .expect("session cookie")
        .into_owned();

    let vote = |value: i64| {
        test::TestRequest::post()
            .uri("/vote/config/1")
            .cookie(cookie.clone())
            .set_json(json!({ "value": value }))
            .to_request()
    };

    let body: Value = test::call_and_read_body_json(&app, vote(1)).await;
    assert_eq!(body, json!({ "vote_score": 1, "user_vote": 1 }));

    let body: Value = test::call_and_read_body_json(&app, vote(1)).await;
    assert_eq!(body, json!({ "vote_score": 0, "user_vote": null }));

    let resp = test::call_service(&app, vote(2)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/vote/user/1")
        .cookie(cookie.clone())
        .set_json(json!({ "value": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_rt::test]
async fn test_mcp_server_page_renders_integration() {
    let db = seeded().await;
    let app = app!(db);

    let req = test::TestRequest::get().uri("/mcp-servers/pkg-server").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["component"], "McpServers/Show");
    assert_eq!(page["url"], "/mcp-servers/pkg-server");
    assert_eq!(page["shared"]["auth"]["user"], Value::Null);

    let integrations = page["props"]["integrations"].as_array().unwrap();
    assert_eq!(integrations.len(), 1);
    assert_eq!(integrations[0]["agent"]["slug"], "claude-code");
    assert_eq!(
        integrations[0]["integration"]["config"],
        json!({ "mcpServers": { "pkg-server": { "command": "npx", "args": ["-y", "pkg"] } } })
    );
}

#[actix_rt::test]
async fn test_config_page_has_install_paths() {
    let db = seeded().await;
    let app = app!(db);

    let req = test::TestRequest::get().uri("/configs/terse-rules").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["props"]["install"]["project_path"], "CLAUDE.md");
    assert_eq!(page["props"]["files"][0]["filename"], "CLAUDE.md");
    assert_eq!(page["props"]["interaction"]["vote_score"], 0);
    assert_eq!(page["props"]["can_edit"], false);
}

#[actix_rt::test]
async fn test_unknown_route_renders_document() {
    let db = test_db().await;
    let app = app!(db);

    let req = test::TestRequest::get().uri("/no/such/page").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().to_owned();
    assert!(content_type.starts_with("text/html"));
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("404"));
}

#[actix_rt::test]
async fn test_missing_record_is_json() {
    let db = test_db().await;
    let app = app!(db);

    let req = test::TestRequest::get().uri("/skills/nothing-here").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Skill not found.");
}

#[actix_rt::test]
async fn test_huge_page_number_is_clamped() {
    let db = seeded().await;
    let app = app!(db);

    let req = test::TestRequest::get()
        .uri("/configs?page=9223372036854775807")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = test::read_body_json(resp).await;
    assert_eq!(page["props"]["configs"]["meta"]["current_page"], 1);
    assert_eq!(page["props"]["configs"]["data"][0]["title"], "Terse rules");
}
