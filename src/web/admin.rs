//! Admin-only management of agents and taxonomies.

use crate::agent::{create_agent, list_agents, update_agent, AgentForm};
use crate::error::AppError;
use crate::frontend::{Page, PageResult};
use crate::middleware::ClientCtx;
use crate::taxonomy::{
    create_category, create_config_type, delete_category, delete_config_type, list_categories,
    list_config_types, update_category, update_config_type, TaxonomyForm,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_admin)
        .service(post_agent)
        .service(put_agent)
        .service(post_config_type)
        .service(put_config_type)
        .service(destroy_config_type)
        .service(post_category)
        .service(put_category)
        .service(destroy_category);
}

/// Agents are listed with their full templates here, unlike public pages.
#[get("/admin")]
async fn view_admin(client: ClientCtx, db: web::Data<DatabaseConnection>) -> PageResult {
    client.require_admin()?;
    let db = db.get_ref();
    Page::new(
        "Admin/Index",
        json!({
            "agents": list_agents(db).await?,
            "config_types": list_config_types(db, None).await?,
            "categories": list_categories(db).await?,
        }),
    )
}

#[post("/admin/agents")]
async fn post_agent(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<AgentForm>,
) -> Result<impl Responder, AppError> {
    client.require_admin()?;
    let agent = create_agent(db.get_ref(), &form).await?;
    Ok(HttpResponse::Created().json(json!({ "agent": agent })))
}

#[put("/admin/agents/{id}")]
async fn put_agent(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<AgentForm>,
) -> Result<impl Responder, AppError> {
    client.require_admin()?;
    let agent = update_agent(db.get_ref(), path.into_inner(), &form).await?;
    Ok(HttpResponse::Ok().json(json!({ "agent": agent })))
}

#[post("/admin/config-types")]
async fn post_config_type(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<TaxonomyForm>,
) -> Result<impl Responder, AppError> {
    client.require_admin()?;
    let config_type = create_config_type(db.get_ref(), &form).await?;
    Ok(HttpResponse::Created().json(json!({ "config_type": config_type })))
}

#[put("/admin/config-types/{id}")]
async fn put_config_type(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<TaxonomyForm>,
) -> Result<impl Responder, AppError> {
    client.require_admin()?;
    let config_type = update_config_type(db.get_ref(), path.into_inner(), &form).await?;
    Ok(HttpResponse::Ok().json(json!({ "config_type": config_type })))
}

#[delete("/admin/config-types/{id}")]
async fn destroy_config_type(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    client.require_admin()?;
    delete_config_type(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/admin/categories")]
async fn post_category(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<TaxonomyForm>,
) -> Result<impl Responder, AppError> {
    client.require_admin()?;
    let category = create_category(db.get_ref(), &form).await?;
    Ok(HttpResponse::Created().json(json!({ "category": category })))
}

#[put("/admin/categories/{id}")]
async fn put_category(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<TaxonomyForm>,
) -> Result<impl Responder, AppError> {
    client.require_admin()?;
    let category = update_category(db.get_ref(), path.into_inner(), &form).await?;
    Ok(HttpResponse::Ok().json(json!({ "category": category })))
}

#[delete("/admin/categories/{id}")]
async fn destroy_category(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    client.require_admin()?;
    delete_category(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
