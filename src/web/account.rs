use super::{per_page, ListQuery};
use crate::config::{list_configs, ConfigFilter};
use crate::content::ContentKind;
use crate::error::AppError;
use crate::favorite::favorited_ids;
use crate::frontend::{Page, PageResult};
use crate::global::get_settings;
use crate::listing::Sort;
use crate::mcp_server::{list_mcp_servers, McpServerFilter};
use crate::middleware::ClientCtx;
use crate::oauth::{authorize_url, fetch_profile, link_identity, new_state, STATE_KEY};
use crate::orm::user_identities::Provider;
use crate::prompt::{list_prompts, PromptFilter};
use crate::session::{new_session, remove_session};
use crate::skill::{list_skills, SkillFilter};
use crate::user::{get_profile_by_name, login_user, register_user, ClientUser, LoginForm, RegisterForm};
use actix_session::Session;
use actix_web::http::header;
use actix_web::{get, post, web, HttpResponse, Responder};
use sea_orm::{DatabaseConnection, Iterable};
use serde::Deserialize;
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_login)
        .service(post_login)
        .service(view_register)
        .service(post_register)
        .service(post_logout)
        .service(oauth_redirect)
        .service(oauth_callback)
        .service(view_favorites)
        .service(view_user);
}

/// Providers with client credentials configured.
fn enabled_providers() -> Vec<&'static str> {
    let settings = get_settings();
    Provider::iter()
        .filter(|p| settings.oauth_client(*p).is_some())
        .map(|p| p.as_slug())
        .collect()
}

fn provider(slug: &str) -> Result<Provider, AppError> {
    Provider::from_slug(slug).ok_or(AppError::NotFound("Provider"))
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

#[get("/login")]
async fn view_login() -> PageResult {
    Page::new("Auth/Login", json!({ "providers": enabled_providers() }))
}

#[get("/register")]
async fn view_register() -> PageResult {
    Page::new("Auth/Register", json!({ "providers": enabled_providers() }))
}

#[post("/login")]
async fn post_login(
    db: web::Data<DatabaseConnection>,
    cookies: Session,
    form: web::Json<LoginForm>,
) -> Result<impl Responder, AppError> {
    let user = login_user(db.get_ref(), &form).await?;
    new_session(db.get_ref(), &cookies, user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "user": ClientUser::from(user) })))
}

#[post("/register")]
async fn post_register(
    db: web::Data<DatabaseConnection>,
    cookies: Session,
    form: web::Json<RegisterForm>,
) -> Result<impl Responder, AppError> {
    let user = register_user(db.get_ref(), &form).await?;
    new_session(db.get_ref(), &cookies, user.id).await?;
    Ok(HttpResponse::Created().json(json!({ "user": ClientUser::from(user) })))
}

#[post("/logout")]
async fn post_logout(
    db: web::Data<DatabaseConnection>,
    cookies: Session,
) -> Result<impl Responder, AppError> {
    remove_session(db.get_ref(), &cookies).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/auth/{provider}/redirect")]
async fn oauth_redirect(
    cookies: Session,
    path: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let provider = provider(&path.into_inner())?;
    let settings = get_settings();
    let client = settings
        .oauth_client(provider)
        .ok_or(AppError::NotFound("Provider"))?;

    let state = new_state();
    cookies
        .insert(STATE_KEY, &state)
        .map_err(|e| AppError::Internal(format!("storing oauth state: {}", e)))?;
    let url = authorize_url(provider, client, &state, &settings.gitlab_url)
        .map_err(|e| AppError::Internal(format!("building authorize url: {}", e)))?;

    Ok(redirect_to(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[get("/auth/{provider}/callback")]
async fn oauth_callback(
    db: web::Data<DatabaseConnection>,
    cookies: Session,
    path: web::Path<String>,
    query: web::Query<CallbackQuery>,
) -> Result<impl Responder, AppError> {
    let provider = provider(&path.into_inner())?;
    let client = get_settings()
        .oauth_client(provider)
        .ok_or(AppError::NotFound("Provider"))?;

    let expected = cookies.remove_as::<String>(STATE_KEY).and_then(Result::ok);
    if expected.is_none() || expected != query.state {
        return Err(AppError::Validation("The sign-in request expired. Please try again.".to_owned()));
    }
    if let Some(error) = &query.error {
        log::info!("{} sign-in declined: {}", provider.as_slug(), error);
        return Ok(redirect_to("/login"));
    }
    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::Validation("Missing authorization code.".to_owned()))?;

    let profile = fetch_profile(provider, client, code).await?;
    let user = link_identity(db.get_ref(), provider, &profile).await?;
    new_session(db.get_ref(), &cookies, user.id).await?;
    log::info!("user {} signed in with {}", user.id, provider.as_slug());

    Ok(redirect_to("/"))
}

#[get("/favorites")]
async fn view_favorites(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let user_id = client.require_user()?;
    let db = db.get_ref();
    let (sort, page, per_page) = (query.sort, query.page(), per_page());
    let ids = |kind| favorited_ids(db, user_id, kind);

    let configs = ConfigFilter {
        ids: Some(ids(ContentKind::Config).await?),
        ..Default::default()
    };
    let mcp_servers = McpServerFilter {
        ids: Some(ids(ContentKind::McpServer).await?),
        ..Default::default()
    };
    let prompts = PromptFilter {
        ids: Some(ids(ContentKind::Prompt).await?),
        ..Default::default()
    };
    let skills = SkillFilter {
        ids: Some(ids(ContentKind::Skill).await?),
        ..Default::default()
    };

    Page::new(
        "Favorites",
        json!({
            "configs": list_configs(db, &configs, sort, page, per_page).await?,
            "mcp_servers": list_mcp_servers(db, &mcp_servers, sort, page, per_page).await?,
            "prompts": list_prompts(db, &prompts, sort, page, per_page).await?,
            "skills": list_skills(db, &skills, sort, page, per_page).await?,
            "filters": &*query,
        }),
    )
}

#[get("/users/{name}")]
async fn view_user(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> PageResult {
    let db = db.get_ref();
    let profile = get_profile_by_name(db, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let user_id = Some(profile.id);
    let per_page = per_page();

    let submissions = json!({
        "configs": list_configs(db, &ConfigFilter { user_id, ..Default::default() }, Sort::New, 1, per_page).await?,
        "mcp_servers": list_mcp_servers(db, &McpServerFilter { user_id, ..Default::default() }, Sort::New, 1, per_page).await?,
        "prompts": list_prompts(db, &PromptFilter { user_id, ..Default::default() }, Sort::New, 1, per_page).await?,
        "skills": list_skills(db, &SkillFilter { user_id, ..Default::default() }, Sort::New, 1, per_page).await?,
    });

    Page::new("Users/Show", json!({ "user": profile, "submissions": submissions }))
}
