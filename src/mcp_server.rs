//! MCP servers, local (spawned command) or remote (URL).

use crate::content::{Actor, ContentKind, Target};
use crate::error::AppError;
use crate::interaction::purge_interactions;
use crate::listing::{paginate, text_match, Paginated, Sort};
use crate::orm::mcp_servers::{self, ServerType};
use crate::orm::users;
use crate::slug::unique_slug;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult,
    SelectModel, Selector, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct McpServerForList {
    pub id: i32,
    pub user_id: Option<i32>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    pub vote_score: i32,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    // join users
    pub username: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct McpServerFilter {
    pub server_type: Option<ServerType>,
    pub user_id: Option<i32>,
    pub ids: Option<Vec<i32>>,
    pub search: Option<String>,
}

pub fn filtered(filter: &McpServerFilter) -> Select<mcp_servers::Entity> {
    let mut query = mcp_servers::Entity::find();
    if let Some(server_type) = filter.server_type {
        query = query.filter(mcp_servers::Column::ServerType.eq(server_type));
    }
    if let Some(id) = filter.user_id {
        query = query.filter(mcp_servers::Column::UserId.eq(id));
    }
    if let Some(ids) = &filter.ids {
        query = query.filter(mcp_servers::Column::Id.is_in(ids.clone()));
    }
    if let Some(q) = filter.search.as_deref().filter(|q| !q.trim().is_empty()) {
        query = query.filter(text_match::<mcp_servers::Entity>(
            &[mcp_servers::Column::Name, mcp_servers::Column::Description],
            q,
        ));
    }
    query
}

pub fn with_names(query: Select<mcp_servers::Entity>) -> Selector<SelectModel<McpServerForList>> {
    query
        .select_only()
        .columns([
            mcp_servers::Column::Id,
            mcp_servers::Column::UserId,
            mcp_servers::Column::Name,
            mcp_servers::Column::Slug,
            mcp_servers::Column::Description,
            mcp_servers::Column::ServerType,
            mcp_servers::Column::VoteScore,
            mcp_servers::Column::CreatedAt,
            mcp_servers::Column::UpdatedAt,
        ])
        .left_join(users::Entity)
        .column_as(users::Column::Name, "username")
        .into_model::<McpServerForList>()
}

/// One sorted page of MCP servers matching `filter`.
pub async fn list_mcp_servers<C: ConnectionTrait>(
    db: &C,
    filter: &McpServerFilter,
    sort: Sort,
    page: u64,
    per_page: u64,
) -> Result<Paginated<McpServerForList>, DbErr> {
    let query = sort.apply(
        filtered(filter),
        mcp_servers::Column::VoteScore,
        mcp_servers::Column::CreatedAt,
        mcp_servers::Column::Name,
    );
    paginate(db, with_names(query), page, per_page).await
}

pub async fn get_mcp_server_by_slug<C: ConnectionTrait>(db: &C, slug: &str) -> Result<Option<mcp_servers::Model>, DbErr> {
    mcp_servers::Entity::find()
        .filter(mcp_servers::Column::Slug.eq(slug))
        .one(db)
        .await
}

#[derive(Clone, Debug, Deserialize)]
pub struct McpServerForm {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub source_url: Option<String>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn is_web_url(value: &str) -> bool {
    matches!(url::Url::parse(value), Ok(url) if url.scheme() == "http" || url.scheme() == "https")
}

impl McpServerForm {
    pub fn validate(&self) -> Result<(), AppError> {
        let name = self.name.trim().chars().count();
        if name == 0 || name > 255 {
            return Err(AppError::Validation("The name must be 1 to 255 characters.".to_owned()));
        }
        match self.server_type {
            ServerType::Local => {
                if trimmed(&self.command).is_none() {
                    return Err(AppError::Validation("Local servers need a command.".to_owned()));
                }
            }
            ServerType::Remote => match trimmed(&self.url) {
                Some(url) if is_web_url(&url) => {}
                _ => {
                    return Err(AppError::Validation(
                        "Remote servers need an http or https URL.".to_owned(),
                    ))
                }
            },
        }
        if self.env.keys().any(|k| k.trim().is_empty()) || self.headers.keys().any(|k| k.trim().is_empty()) {
            return Err(AppError::Validation("Variable and header names cannot be blank.".to_owned()));
        }
        if let Some(source) = trimmed(&self.source_url) {
            if !is_web_url(&source) {
                return Err(AppError::Validation("The source URL must be an http or https URL.".to_owned()));
            }
        }
        Ok(())
    }

    /// Local servers keep only command fields, remote servers only URL fields.
    fn apply(&self, model: &mut mcp_servers::ActiveModel) {
        let local = self.server_type == ServerType::Local;
        let map = |m: &BTreeMap<String, String>| {
            Value::Object(
                m.iter()
                    .map(|(k, v)| (k.trim().to_owned(), Value::from(v.as_str())))
                    .collect(),
            )
        };

        model.name = Set(self.name.trim().to_owned());
        model.description = Set(trimmed(&self.description));
        model.server_type = Set(self.server_type);
        model.command = Set(if local { trimmed(&self.command) } else { None });
        model.args = Set(if local { Value::from(self.args.clone()) } else { Value::Array(Vec::new()) });
        model.env = Set(if local { map(&self.env) } else { map(&BTreeMap::new()) });
        model.url = Set(if local { None } else { trimmed(&self.url) });
        model.headers = Set(if local { map(&BTreeMap::new()) } else { map(&self.headers) });
        model.source_url = Set(trimmed(&self.source_url));
    }
}

pub async fn create_mcp_server(
    db: &DatabaseConnection,
    user_id: i32,
    form: &McpServerForm,
) -> Result<mcp_servers::Model, AppError> {
    form.validate()?;
    let slug = unique_slug::<mcp_servers::Entity, _>(
        db,
        mcp_servers::Column::Slug,
        mcp_servers::Column::Id,
        &form.name,
        None,
    )
    .await?;

    let now = Utc::now().naive_utc();
    let mut model = mcp_servers::ActiveModel {
        user_id: Set(Some(user_id)),
        slug: Set(slug),
        vote_score: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    form.apply(&mut model);
    Ok(model.insert(db).await?)
}

pub async fn update_mcp_server(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    form: &McpServerForm,
) -> Result<mcp_servers::Model, AppError> {
    let existing = mcp_servers::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("MCP server"))?;
    actor.authorize(existing.user_id)?;
    form.validate()?;

    let slug = unique_slug::<mcp_servers::Entity, _>(
        db,
        mcp_servers::Column::Slug,
        mcp_servers::Column::Id,
        &form.name,
        Some(id),
    )
    .await?;
    let mut model: mcp_servers::ActiveModel = existing.into();
    model.slug = Set(slug);
    model.updated_at = Set(Utc::now().naive_utc());
    form.apply(&mut model);
    Ok(model.update(db).await?)
}

pub async fn delete_mcp_server(db: &DatabaseConnection, actor: Actor, id: i32) -> Result<(), AppError> {
    let existing = mcp_servers::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("MCP server"))?;
    actor.authorize(existing.user_id)?;

    let txn = db.begin().await?;
    purge_interactions(&txn, Target::new(ContentKind::McpServer, id)).await?;
    existing.delete(&txn).await?;
    txn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(body: Value) -> McpServerForm {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_local_needs_command() {
        assert!(form(json!({ "name": "fs", "type": "local", "command": "npx" })).validate().is_ok());
        assert!(form(json!({ "name": "fs", "type": "local" })).validate().is_err());
        assert!(form(json!({ "name": "fs", "type": "local", "command": " " })).validate().is_err());
    }

    #[test]
    fn test_remote_needs_web_url() {
        assert!(form(json!({ "name": "docs", "type": "remote", "url": "https://mcp.example.com" }))
            .validate()
            .is_ok());
        assert!(form(json!({ "name": "docs", "type": "remote", "url": "ftp://x" })).validate().is_err());
        assert!(form(json!({ "name": "docs", "type": "remote" })).validate().is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_value::<McpServerForm>(json!({ "name": "x", "type": "ws" })).is_err());
    }

    #[test]
    fn test_apply_drops_fields_of_other_type() {
        let form = form(json!({
            "name": "docs",
            "type": "remote",
            "url": "https://mcp.example.com",
            "command": "npx",
            "args": ["-y"],
            "headers": { "X-Key": "1" }
        }));
        let mut model = <mcp_servers::ActiveModel as Default>::default();
        form.apply(&mut model);
        assert_eq!(model.command, Set(None));
        assert_eq!(model.args, Set(json!([])));
        assert_eq!(model.headers, Set(json!({ "X-Key": "1" })));
    }
}
