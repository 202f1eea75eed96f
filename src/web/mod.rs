pub mod account;
pub mod admin;
pub mod agent;
pub mod config;
pub mod error;
pub mod index;
pub mod interaction;
pub mod mcp_server;
pub mod prompt;
pub mod skill;
pub mod taxonomy;

use crate::agent::find_agent_by_slug;
use crate::comment::get_comment_tree;
use crate::content::Target;
use crate::error::AppError;
use crate::global::get_settings;
use crate::interaction::interaction_state;
use crate::listing::{clamp_page, Sort};
use crate::orm::{agents, users};
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    interaction::configure(conf);
    account::configure(conf);
    admin::configure(conf);
    index::configure(conf);
    agent::configure(conf);
    taxonomy::configure(conf);
    config::configure(conf);
    mcp_server::configure(conf);
    prompt::configure(conf);
    skill::configure(conf);
}

/// Query string accepted by listing pages. Pages ignore what they don't use.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ListQuery {
    #[serde(default)]
    pub sort: Sort,
    #[serde(skip_serializing)]
    pub page: Option<i64>,
    pub q: Option<String>,
    /// Agent slug.
    pub agent: Option<String>,
    /// Config type slug.
    pub config_type: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Content type tag on search, server type on MCP listings.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> u64 {
        clamp_page(self.page)
    }

    pub fn search(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_owned)
    }
}

/// Minimal agent reference embedded in content props.
#[derive(Clone, Debug, Serialize)]
pub struct AgentRef {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl From<&agents::Model> for AgentRef {
    fn from(agent: &agents::Model) -> Self {
        Self {
            id: agent.id,
            name: agent.name.to_owned(),
            slug: agent.slug.to_owned(),
        }
    }
}

pub(crate) fn per_page() -> u64 {
    get_settings().per_page
}

/// Resolves an optional `?agent=` slug. An unknown slug is a 404.
pub(crate) async fn agent_filter(
    db: &DatabaseConnection,
    slug: Option<&str>,
) -> Result<Option<agents::Model>, AppError> {
    match slug.filter(|s| !s.is_empty()) {
        Some(slug) => Ok(Some(
            find_agent_by_slug(db, slug)
                .await?
                .ok_or(AppError::NotFound("Agent"))?,
        )),
        None => Ok(None),
    }
}

/// Name of the author, if the account still exists.
pub(crate) async fn author_name(
    db: &DatabaseConnection,
    user_id: Option<i32>,
) -> Result<Option<String>, AppError> {
    let Some(id) = user_id else {
        return Ok(None);
    };
    Ok(users::Entity::find_by_id(id)
        .select_only()
        .column(users::Column::Name)
        .into_tuple::<String>()
        .one(db)
        .await?)
}

/// Comment tree and the viewer's interaction state, shared by show pages.
pub(crate) async fn discussion(
    db: &DatabaseConnection,
    target: Target,
    vote_score: i32,
    viewer: Option<i32>,
) -> Result<(Value, Value), AppError> {
    let comments = get_comment_tree(db, target, viewer).await?;
    let state = interaction_state(db, target, vote_score, viewer).await?;
    Ok((json!(comments), json!(state)))
}
