//! Agents and their admin-authored integration templates.

use crate::error::AppError;
use crate::integration::template::{
    validate_config_type_templates, validate_mcp_template, validate_skills_template,
    validate_transport_list,
};
use crate::orm::{agents, configs, prompts};
use crate::slug::unique_slug;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct AgentForm {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub supports_mcp: bool,
    #[serde(default)]
    pub supports_skills: bool,
    #[serde(default = "empty_list")]
    pub mcp_transport_types: Value,
    pub mcp_config_template: Option<Value>,
    pub skills_config_template: Option<Value>,
    pub config_type_templates: Option<Value>,
    #[serde(default)]
    pub sort_order: i32,
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

fn non_null(value: &Option<Value>) -> Option<&Value> {
    value.as_ref().filter(|v| !v.is_null())
}

impl AgentForm {
    /// Checks the form, including every template against its schema.
    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |e: crate::integration::TemplateError| AppError::Validation(e.to_string());

        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(AppError::Validation("The name must be 1 to 100 characters.".to_owned()));
        }
        if let Some(website) = self.website.as_deref().filter(|w| !w.is_empty()) {
            if url::Url::parse(website).is_err() {
                return Err(AppError::Validation("The website must be a valid URL.".to_owned()));
            }
        }

        validate_transport_list(&self.mcp_transport_types).map_err(invalid)?;
        if let Some(template) = non_null(&self.mcp_config_template) {
            validate_mcp_template(template).map_err(invalid)?;
        }
        if let Some(template) = non_null(&self.skills_config_template) {
            validate_skills_template(template).map_err(invalid)?;
        }
        if let Some(template) = non_null(&self.config_type_templates) {
            validate_config_type_templates(template).map_err(invalid)?;
        }
        Ok(())
    }

    fn apply(&self, model: &mut agents::ActiveModel) {
        let trimmed = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        model.name = Set(self.name.trim().to_owned());
        model.description = Set(trimmed(&self.description));
        model.website = Set(trimmed(&self.website));
        model.supports_mcp = Set(self.supports_mcp);
        model.supports_skills = Set(self.supports_skills);
        model.mcp_transport_types = Set(self.mcp_transport_types.clone());
        model.mcp_config_template = Set(non_null(&self.mcp_config_template).cloned());
        model.skills_config_template = Set(non_null(&self.skills_config_template).cloned());
        model.config_type_templates = Set(non_null(&self.config_type_templates).cloned());
        model.sort_order = Set(self.sort_order);
    }

    fn slug_source(&self) -> &str {
        self.slug.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(&self.name)
    }
}

/// Public view of an agent for listings and cards.
#[derive(Clone, Debug, Serialize)]
pub struct AgentSummary {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub supports_mcp: bool,
    pub supports_skills: bool,
    pub configs_count: u64,
    pub prompts_count: u64,
}

#[derive(Debug, FromQueryResult)]
struct AgentCount {
    agent_id: Option<i32>,
    count: i64,
}

async fn counts_by_agent<C, E>(db: &C, select: Select<E>, agent_col: E::Column, id_col: E::Column) -> Result<HashMap<i32, u64>, DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    Ok(select
        .select_only()
        .column_as(agent_col, "agent_id")
        .column_as(Expr::col(id_col).count(), "count")
        .group_by(agent_col)
        .into_model::<AgentCount>()
        .all(db)
        .await?
        .into_iter()
        .filter_map(|row| row.agent_id.map(|id| (id, row.count.max(0) as u64)))
        .collect())
}

/// All agents in display order.
pub async fn list_agents<C: ConnectionTrait>(db: &C) -> Result<Vec<agents::Model>, DbErr> {
    agents::Entity::find()
        .order_by_asc(agents::Column::SortOrder)
        .order_by_asc(agents::Column::Name)
        .all(db)
        .await
}

/// All agents in display order with their content counts.
pub async fn list_agent_summaries<C: ConnectionTrait>(db: &C) -> Result<Vec<AgentSummary>, DbErr> {
    let config_counts = counts_by_agent(
        db,
        configs::Entity::find(),
        configs::Column::AgentId,
        configs::Column::Id,
    )
    .await?;
    let prompt_counts = counts_by_agent(
        db,
        prompts::Entity::find(),
        prompts::Column::AgentId,
        prompts::Column::Id,
    )
    .await?;

    Ok(list_agents(db)
        .await?
        .into_iter()
        .map(|agent| AgentSummary {
            configs_count: config_counts.get(&agent.id).copied().unwrap_or(0),
            prompts_count: prompt_counts.get(&agent.id).copied().unwrap_or(0),
            id: agent.id,
            name: agent.name,
            slug: agent.slug,
            description: agent.description,
            website: agent.website,
            supports_mcp: agent.supports_mcp,
            supports_skills: agent.supports_skills,
        })
        .collect())
}

pub async fn find_agent_by_slug<C: ConnectionTrait>(db: &C, slug: &str) -> Result<Option<agents::Model>, DbErr> {
    agents::Entity::find()
        .filter(agents::Column::Slug.eq(slug))
        .one(db)
        .await
}

pub async fn create_agent(db: &DatabaseConnection, form: &AgentForm) -> Result<agents::Model, AppError> {
    form.validate()?;
    let slug = unique_slug::<agents::Entity, _>(
        db,
        agents::Column::Slug,
        agents::Column::Id,
        form.slug_source(),
        None,
    )
    .await?;

    let mut model = agents::ActiveModel {
        slug: Set(slug),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };
    form.apply(&mut model);
    let agent = model.insert(db).await?;
    log::info!("created agent {}", agent.slug);
    Ok(agent)
}

pub async fn update_agent(
    db: &DatabaseConnection,
    id: i32,
    form: &AgentForm,
) -> Result<agents::Model, AppError> {
    form.validate()?;
    let existing = agents::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Agent"))?;
    let slug = unique_slug::<agents::Entity, _>(
        db,
        agents::Column::Slug,
        agents::Column::Id,
        form.slug_source(),
        Some(id),
    )
    .await?;

    let mut model: agents::ActiveModel = existing.into();
    model.slug = Set(slug);
    form.apply(&mut model);
    Ok(model.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(body: Value) -> AgentForm {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_minimal_form_is_valid() {
        let form = form(json!({ "name": "Cursor" }));
        assert!(form.validate().is_ok());
        assert_eq!(form.mcp_transport_types, json!([]));
        assert_eq!(form.slug_source(), "Cursor");
    }

    #[test]
    fn test_templates_are_checked() {
        let good = form(json!({
            "name": "Claude Code",
            "supports_mcp": true,
            "mcp_transport_types": ["stdio", "http"],
            "mcp_config_template": {
                "stdio": { "fields": { "command": "command", "args": "args" } },
                "http": { "type_value": "http", "fields": { "type": "type", "url": "url" } }
            },
            "skills_config_template": { "project_path": ".claude/skills" },
            "config_type_templates": null
        }));
        assert!(good.validate().is_ok());

        let bad_transport = form(json!({ "name": "X", "mcp_transport_types": ["pigeon"] }));
        assert!(matches!(bad_transport.validate(), Err(AppError::Validation(m)) if m.contains("pigeon")));

        let bad_template = form(json!({
            "name": "X",
            "mcp_config_template": { "stdio": { "fields": ["command"] } }
        }));
        assert!(bad_template.validate().is_err());

        let unknown_key = form(json!({
            "name": "X",
            "skills_config_template": { "global": "~/.x" }
        }));
        assert!(unknown_key.validate().is_err());
    }

    #[test]
    fn test_name_and_website() {
        assert!(form(json!({ "name": "  " })).validate().is_err());
        assert!(form(json!({ "name": "X", "website": "not a url" })).validate().is_err());
        assert!(form(json!({ "name": "X", "website": "https://x.dev" })).validate().is_ok());
    }
}
