use super::{author_name, discussion, per_page, AgentRef, ListQuery};
use crate::agent::list_agents;
use crate::content::{ContentKind, Target};
use crate::error::AppError;
use crate::frontend::{Page, PageResult};
use crate::integration::render_mcp;
use crate::mcp_server::{
    create_mcp_server, delete_mcp_server, get_mcp_server_by_slug, list_mcp_servers,
    update_mcp_server, McpServerFilter, McpServerForm,
};
use crate::middleware::ClientCtx;
use crate::orm::mcp_servers::ServerType;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_mcp_servers)
        .service(view_mcp_server)
        .service(post_mcp_server)
        .service(put_mcp_server)
        .service(destroy_mcp_server);
}

fn server_type(value: Option<&str>) -> Result<Option<ServerType>, AppError> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some("local") => Ok(Some(ServerType::Local)),
        Some("remote") => Ok(Some(ServerType::Remote)),
        Some(_) => Err(AppError::Validation("Unknown server type.".to_owned())),
    }
}

#[get("/mcp-servers")]
async fn view_mcp_servers(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let filter = McpServerFilter {
        server_type: server_type(query.kind.as_deref())?,
        search: query.search(),
        ..Default::default()
    };

    Page::new(
        "McpServers/Index",
        json!({
            "mcp_servers": list_mcp_servers(db.get_ref(), &filter, query.sort, query.page(), per_page()).await?,
            "filters": &*query,
        }),
    )
}

#[get("/mcp-servers/{slug}")]
async fn view_mcp_server(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> PageResult {
    let db = db.get_ref();
    let server = get_mcp_server_by_slug(db, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("MCP server"))?;

    let integrations: Vec<_> = list_agents(db)
        .await?
        .iter()
        .filter_map(|agent| {
            render_mcp(agent, &server).map(|integration| {
                json!({ "agent": AgentRef::from(agent), "integration": integration })
            })
        })
        .collect();

    let target = Target::new(ContentKind::McpServer, server.id);
    let (comments, interaction) = discussion(db, target, server.vote_score, client.get_id()).await?;

    Page::new(
        "McpServers/Show",
        json!({
            "username": author_name(db, server.user_id).await?,
            "can_edit": client.can_modify(server.user_id),
            "mcp_server": server,
            "integrations": integrations,
            "comments": comments,
            "interaction": interaction,
        }),
    )
}

#[post("/mcp-servers")]
async fn post_mcp_server(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<McpServerForm>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    let server = create_mcp_server(db.get_ref(), user_id, &form).await?;
    log::info!("user {} created MCP server {}", user_id, server.slug);
    Ok(HttpResponse::Created().json(json!({ "mcp_server": server })))
}

#[put("/mcp-servers/{id}")]
async fn put_mcp_server(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<McpServerForm>,
) -> Result<impl Responder, AppError> {
    let server = update_mcp_server(db.get_ref(), client.actor()?, path.into_inner(), &form).await?;
    Ok(HttpResponse::Ok().json(json!({ "mcp_server": server })))
}

#[delete("/mcp-servers/{id}")]
async fn destroy_mcp_server(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    delete_mcp_server(db.get_ref(), client.actor()?, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
