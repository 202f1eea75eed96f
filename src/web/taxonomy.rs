use super::{agent_filter, per_page, AgentRef, ListQuery};
use crate::agent::list_agents;
use crate::config::{list_configs, ConfigFilter};
use crate::error::AppError;
use crate::frontend::{Page, PageResult};
use crate::prompt::{list_prompts, PromptFilter};
use crate::taxonomy::{find_category_by_slug, find_config_type_by_slug, list_categories, list_config_types};
use actix_web::{get, web};
use sea_orm::DatabaseConnection;
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_config_type)
        .service(view_categories)
        .service(view_category);
}

#[get("/config-types/{slug}")]
async fn view_config_type(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let db = db.get_ref();
    let config_type = find_config_type_by_slug(db, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Config type"))?;
    let agent = agent_filter(db, query.agent.as_deref()).await?;

    let filter = ConfigFilter {
        config_type_id: Some(config_type.id),
        agent_id: agent.as_ref().map(|a| a.id),
        ..Default::default()
    };
    let agents: Vec<AgentRef> = list_agents(db).await?.iter().map(AgentRef::from).collect();

    Page::new(
        "ConfigTypes/Show",
        json!({
            "config_type": config_type,
            "configs": list_configs(db, &filter, query.sort, query.page(), per_page()).await?,
            "agents": agents,
            "filters": &*query,
        }),
    )
}

#[get("/categories")]
async fn view_categories(db: web::Data<DatabaseConnection>) -> PageResult {
    let db = db.get_ref();
    Page::new(
        "Categories/Index",
        json!({
            "categories": list_categories(db).await?,
            "config_types": list_config_types(db, None).await?,
        }),
    )
}

#[get("/categories/{slug}")]
async fn view_category(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let db = db.get_ref();
    let category = find_category_by_slug(db, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    let agent_id = agent_filter(db, query.agent.as_deref()).await?.map(|a| a.id);

    let configs = ConfigFilter {
        category_id: Some(category.id),
        agent_id,
        ..Default::default()
    };
    let prompts = PromptFilter {
        category_id: Some(category.id),
        agent_id,
        ..Default::default()
    };

    Page::new(
        "Categories/Show",
        json!({
            "category": category,
            "configs": list_configs(db, &configs, query.sort, query.page(), per_page()).await?,
            "prompts": list_prompts(db, &prompts, query.sort, query.page(), per_page()).await?,
            "filters": &*query,
        }),
    )
}
