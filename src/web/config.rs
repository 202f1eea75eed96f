use super::{agent_filter, discussion, per_page, AgentRef, ListQuery};
use crate::agent::list_agents;
use crate::config::{
    create_config, delete_config, get_config_by_slug, get_config_files, list_configs,
    update_config, ConfigFilter, ConfigForm,
};
use crate::content::{ContentKind, Target};
use crate::error::AppError;
use crate::frontend::{Page, PageResult};
use crate::integration::render_config_paths;
use crate::middleware::ClientCtx;
use crate::orm::agents;
use crate::taxonomy::{find_category_by_slug, find_config_type_by_slug, list_categories, list_config_types};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_configs)
        .service(view_config)
        .service(post_config)
        .service(put_config)
        .service(destroy_config);
}

#[get("/configs")]
async fn view_configs(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let db = db.get_ref();
    let agent = agent_filter(db, query.agent.as_deref()).await?;
    let config_type = match query.config_type.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => Some(
            find_config_type_by_slug(db, slug)
                .await?
                .ok_or(AppError::NotFound("Config type"))?,
        ),
        None => None,
    };
    let category = match query.category.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => Some(
            find_category_by_slug(db, slug)
                .await?
                .ok_or(AppError::NotFound("Category"))?,
        ),
        None => None,
    };

    let filter = ConfigFilter {
        agent_id: agent.as_ref().map(|a| a.id),
        config_type_id: config_type.as_ref().map(|t| t.id),
        category_id: category.as_ref().map(|c| c.id),
        search: query.search(),
        ..Default::default()
    };
    let agents: Vec<AgentRef> = list_agents(db).await?.iter().map(AgentRef::from).collect();

    Page::new(
        "Configs/Index",
        json!({
            "configs": list_configs(db, &filter, query.sort, query.page(), per_page()).await?,
            "agents": agents,
            "config_types": list_config_types(db, None).await?,
            "categories": list_categories(db).await?,
            "filters": &*query,
        }),
    )
}

#[get("/configs/{slug}")]
async fn view_config(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> PageResult {
    let db = db.get_ref();
    let config = get_config_by_slug(db, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Config"))?;
    let files = get_config_files(db, config.id).await?;

    let install = match (
        agents::Entity::find_by_id(config.agent_id).one(db).await?,
        config.config_type_slug.as_deref(),
    ) {
        (Some(agent), Some(type_slug)) => render_config_paths(&agent, type_slug),
        _ => None,
    };

    let target = Target::new(ContentKind::Config, config.id);
    let (comments, interaction) = discussion(db, target, config.vote_score, client.get_id()).await?;
    let can_edit = client.can_modify(config.user_id);

    Page::new(
        "Configs/Show",
        json!({
            "config": config,
            "files": files,
            "install": install,
            "comments": comments,
            "interaction": interaction,
            "can_edit": can_edit,
        }),
    )
}

#[post("/configs")]
async fn post_config(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<ConfigForm>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    let config = create_config(db.get_ref(), user_id, &form).await?;
    log::info!("user {} created config {}", user_id, config.slug);
    Ok(HttpResponse::Created().json(json!({ "config": config })))
}

#[put("/configs/{id}")]
async fn put_config(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<ConfigForm>,
) -> Result<impl Responder, AppError> {
    let config = update_config(db.get_ref(), client.actor()?, path.into_inner(), &form).await?;
    Ok(HttpResponse::Ok().json(json!({ "config": config })))
}

#[delete("/configs/{id}")]
async fn destroy_config(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    delete_config(db.get_ref(), client.actor()?, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
