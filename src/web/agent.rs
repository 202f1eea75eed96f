use super::{per_page, ListQuery};
use crate::agent::{find_agent_by_slug, list_agent_summaries};
use crate::config::{list_configs, ConfigFilter};
use crate::error::AppError;
use crate::frontend::{Page, PageResult};
use crate::integration::template::from_stored_transport_list;
use crate::integration::{render_mcp, skill_install_paths};
use crate::orm::{mcp_servers, skills};
use crate::taxonomy::{find_config_type_by_slug, list_config_types};
use actix_web::{get, web};
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_agents).service(view_agent);
}

#[get("/agents")]
async fn view_agents(db: web::Data<DatabaseConnection>) -> PageResult {
    Page::new(
        "Agents/Index",
        json!({ "agents": list_agent_summaries(db.get_ref()).await? }),
    )
}

#[get("/agents/{slug}")]
async fn view_agent(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let db = db.get_ref();
    let agent = find_agent_by_slug(db, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Agent"))?;

    let config_type = match query.config_type.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => Some(
            find_config_type_by_slug(db, slug)
                .await?
                .ok_or(AppError::NotFound("Config type"))?,
        ),
        None => None,
    };
    let filter = ConfigFilter {
        agent_id: Some(agent.id),
        config_type_id: config_type.as_ref().map(|t| t.id),
        ..Default::default()
    };
    let configs = list_configs(db, &filter, query.sort, query.page(), per_page()).await?;

    // Servers without an integration for this agent are left out.
    let mut servers = Vec::new();
    if agent.supports_mcp {
        for server in mcp_servers::Entity::find()
            .order_by_desc(mcp_servers::Column::VoteScore)
            .order_by_desc(mcp_servers::Column::CreatedAt)
            .limit(per_page())
            .all(db)
            .await?
        {
            if let Some(integration) = render_mcp(&agent, &server) {
                servers.push(json!({
                    "id": server.id,
                    "name": server.name,
                    "slug": server.slug,
                    "description": server.description,
                    "type": server.server_type,
                    "vote_score": server.vote_score,
                    "integration": integration,
                }));
            }
        }
    }

    let mut agent_skills = Vec::new();
    if agent.supports_skills {
        for skill in skills::Entity::find()
            .order_by_desc(skills::Column::VoteScore)
            .order_by_desc(skills::Column::CreatedAt)
            .limit(per_page())
            .all(db)
            .await?
        {
            if let Some(paths) = skill_install_paths(&agent, &skill.slug) {
                agent_skills.push(json!({
                    "id": skill.id,
                    "name": skill.name,
                    "slug": skill.slug,
                    "description": skill.description,
                    "vote_score": skill.vote_score,
                    "install": paths,
                }));
            }
        }
    }

    Page::new(
        "Agents/Show",
        json!({
            "agent": {
                "id": agent.id,
                "name": agent.name,
                "slug": agent.slug,
                "description": agent.description,
                "website": agent.website,
                "supports_mcp": agent.supports_mcp,
                "supports_skills": agent.supports_skills,
                "transports": from_stored_transport_list(&agent.mcp_transport_types),
            },
            "config_types": list_config_types(db, Some(agent.id)).await?,
            "configs": configs,
            "mcp_servers": servers,
            "skills": agent_skills,
            "filters": &*query,
        }),
    )
}
