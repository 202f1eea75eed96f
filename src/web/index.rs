use super::{agent_filter, per_page, ListQuery};
use crate::agent::list_agent_summaries;
use crate::config::{list_configs, ConfigFilter};
use crate::content::ContentKind;
use crate::error::AppError;
use crate::frontend::{Page, PageResult};
use crate::listing::Sort;
use crate::mcp_server::{list_mcp_servers, McpServerFilter};
use crate::prompt::{list_prompts, PromptFilter};
use crate::skill::{list_skills, SkillFilter};
use actix_web::{get, web};
use sea_orm::DatabaseConnection;
use serde_json::json;

/// Items of each kind shown in a home page strip.
const HOME_STRIP: u64 = 6;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index).service(view_search);
}

#[get("/")]
async fn view_index(db: web::Data<DatabaseConnection>) -> PageResult {
    let db = db.get_ref();

    let mut strips = serde_json::Map::new();
    for (key, sort) in [("latest", Sort::New), ("top", Sort::Top)] {
        strips.insert(
            key.to_owned(),
            json!({
                "configs": list_configs(db, &ConfigFilter::default(), sort, 1, HOME_STRIP).await?.data,
                "mcp_servers": list_mcp_servers(db, &McpServerFilter::default(), sort, 1, HOME_STRIP).await?.data,
                "prompts": list_prompts(db, &PromptFilter::default(), sort, 1, HOME_STRIP).await?.data,
                "skills": list_skills(db, &SkillFilter::default(), sort, 1, HOME_STRIP).await?.data,
            }),
        );
    }

    Page::new(
        "Home",
        json!({
            "agents": list_agent_summaries(db).await?,
            "latest": strips.remove("latest"),
            "top": strips.remove("top"),
        }),
    )
}

/// Text search. Without `type` every kind answers its first page with
/// totals; with `type` that kind is paginated.
#[get("/search")]
async fn view_search(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let db = db.get_ref();
    let agent = agent_filter(db, query.agent.as_deref()).await?;
    let agent_id = agent.as_ref().map(|a| a.id);
    let search = query.search();
    let kind = match query.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(tag) => Some(
            ContentKind::favoritable(tag)
                .ok_or_else(|| AppError::Validation("Unsupported content type.".to_owned()))?,
        ),
        None => None,
    };
    let sort = query.sort;
    let per_page = per_page();
    let page_of = |k: ContentKind| match kind {
        Some(kind) if kind == k => query.page(),
        _ => 1,
    };
    let wanted = |k: ContentKind| kind.map(|kind| kind == k).unwrap_or(true);

    let configs = if wanted(ContentKind::Config) {
        let filter = ConfigFilter {
            agent_id,
            search: search.clone(),
            ..Default::default()
        };
        Some(list_configs(db, &filter, sort, page_of(ContentKind::Config), per_page).await?)
    } else {
        None
    };
    let mcp_servers = if wanted(ContentKind::McpServer) {
        let filter = McpServerFilter {
            search: search.clone(),
            ..Default::default()
        };
        Some(list_mcp_servers(db, &filter, sort, page_of(ContentKind::McpServer), per_page).await?)
    } else {
        None
    };
    let prompts = if wanted(ContentKind::Prompt) {
        let filter = PromptFilter {
            agent_id,
            search: search.clone(),
            ..Default::default()
        };
        Some(list_prompts(db, &filter, sort, page_of(ContentKind::Prompt), per_page).await?)
    } else {
        None
    };
    let skills = if wanted(ContentKind::Skill) {
        let filter = SkillFilter {
            search: search.clone(),
            ..Default::default()
        };
        Some(list_skills(db, &filter, sort, page_of(ContentKind::Skill), per_page).await?)
    } else {
        None
    };

    let total = [
        configs.as_ref().map(|p| p.meta.total),
        mcp_servers.as_ref().map(|p| p.meta.total),
        prompts.as_ref().map(|p| p.meta.total),
        skills.as_ref().map(|p| p.meta.total),
    ]
    .iter()
    .flatten()
    .sum::<u64>();

    Page::new(
        "Search",
        json!({
            "filters": &*query,
            "total": total,
            "results": {
                "configs": configs,
                "mcp_servers": mcp_servers,
                "prompts": prompts,
                "skills": skills,
            },
        }),
    )
}
