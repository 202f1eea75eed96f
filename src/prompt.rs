//! Reusable prompts, optionally tied to an agent and a category.

use crate::content::{Actor, ContentKind, Target};
use crate::error::AppError;
use crate::interaction::purge_interactions;
use crate::listing::{paginate, text_match, Paginated, Sort};
use crate::orm::{agents, categories, prompts, users};
use crate::slug::unique_slug;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult,
    SelectModel, Selector, TransactionTrait,
};
use serde::{Deserialize, Serialize};

pub const MAX_CONTENT_CHARS: usize = 50_000;

#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct PromptForList {
    pub id: i32,
    pub user_id: Option<i32>,
    pub agent_id: Option<i32>,
    pub category_id: Option<i32>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub content: String,
    pub vote_score: i32,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    // join users
    pub username: Option<String>,
    // join agents
    pub agent_name: Option<String>,
    pub agent_slug: Option<String>,
    // join categories
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PromptFilter {
    pub agent_id: Option<i32>,
    pub category_id: Option<i32>,
    pub user_id: Option<i32>,
    pub ids: Option<Vec<i32>>,
    pub search: Option<String>,
}

pub fn filtered(filter: &PromptFilter) -> Select<prompts::Entity> {
    let mut query = prompts::Entity::find();
    if let Some(id) = filter.agent_id {
        query = query.filter(prompts::Column::AgentId.eq(id));
    }
    if let Some(id) = filter.category_id {
        query = query.filter(prompts::Column::CategoryId.eq(id));
    }
    if let Some(id) = filter.user_id {
        query = query.filter(prompts::Column::UserId.eq(id));
    }
    if let Some(ids) = &filter.ids {
        query = query.filter(prompts::Column::Id.is_in(ids.clone()));
    }
    if let Some(q) = filter.search.as_deref().filter(|q| !q.trim().is_empty()) {
        query = query.filter(text_match::<prompts::Entity>(
            &[prompts::Column::Title, prompts::Column::Description],
            q,
        ));
    }
    query
}

pub fn with_names(query: Select<prompts::Entity>) -> Selector<SelectModel<PromptForList>> {
    query
        .left_join(users::Entity)
        .column_as(users::Column::Name, "username")
        .left_join(agents::Entity)
        .column_as(agents::Column::Name, "agent_name")
        .column_as(agents::Column::Slug, "agent_slug")
        .left_join(categories::Entity)
        .column_as(categories::Column::Name, "category_name")
        .column_as(categories::Column::Slug, "category_slug")
        .into_model::<PromptForList>()
}

/// One sorted page of prompts matching `filter`.
pub async fn list_prompts<C: ConnectionTrait>(
    db: &C,
    filter: &PromptFilter,
    sort: Sort,
    page: u64,
    per_page: u64,
) -> Result<Paginated<PromptForList>, DbErr> {
    let query = sort.apply(
        filtered(filter),
        prompts::Column::VoteScore,
        prompts::Column::CreatedAt,
        prompts::Column::Title,
    );
    paginate(db, with_names(query), page, per_page).await
}

pub async fn get_prompt_by_slug<C: ConnectionTrait>(db: &C, slug: &str) -> Result<Option<PromptForList>, DbErr> {
    with_names(prompts::Entity::find().filter(prompts::Column::Slug.eq(slug)))
        .one(db)
        .await
}

#[derive(Clone, Debug, Deserialize)]
pub struct PromptForm {
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub agent_id: Option<i32>,
    pub category_id: Option<i32>,
}

impl PromptForm {
    pub fn validate(&self) -> Result<(), AppError> {
        let title = self.title.trim().chars().count();
        if title == 0 || title > 255 {
            return Err(AppError::Validation("The title must be 1 to 255 characters.".to_owned()));
        }
        let content = self.content.trim().chars().count();
        if content == 0 || content > MAX_CONTENT_CHARS {
            return Err(AppError::Validation(format!(
                "The prompt must be 1 to {} characters.",
                MAX_CONTENT_CHARS
            )));
        }
        Ok(())
    }

    async fn check_references<C: ConnectionTrait>(&self, db: &C) -> Result<(), AppError> {
        if let Some(agent_id) = self.agent_id {
            if agents::Entity::find_by_id(agent_id).count(db).await? == 0 {
                return Err(AppError::Validation("The selected agent is invalid.".to_owned()));
            }
        }
        if let Some(category_id) = self.category_id {
            if categories::Entity::find_by_id(category_id).count(db).await? == 0 {
                return Err(AppError::Validation("The selected category is invalid.".to_owned()));
            }
        }
        Ok(())
    }

    fn apply(&self, model: &mut prompts::ActiveModel) {
        model.title = Set(self.title.trim().to_owned());
        model.description = Set(self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned));
        model.content = Set(self.content.to_owned());
        model.agent_id = Set(self.agent_id);
        model.category_id = Set(self.category_id);
    }
}

pub async fn create_prompt(
    db: &DatabaseConnection,
    user_id: i32,
    form: &PromptForm,
) -> Result<prompts::Model, AppError> {
    form.validate()?;
    form.check_references(db).await?;
    let slug = unique_slug::<prompts::Entity, _>(db, prompts::Column::Slug, prompts::Column::Id, &form.title, None).await?;

    let now = Utc::now().naive_utc();
    let mut model = prompts::ActiveModel {
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

pub async fn update_prompt(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    form: &PromptForm,
) -> Result<prompts::Model, AppError> {
    let existing = prompts::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Prompt"))?;
    actor.authorize(existing.user_id)?;
    form.validate()?;
    form.check_references(db).await?;

    let slug = unique_slug::<prompts::Entity, _>(db, prompts::Column::Slug, prompts::Column::Id, &form.title, Some(id)).await?;
    let mut model: prompts::ActiveModel = existing.into();
    model.slug = Set(slug);
    model.updated_at = Set(Utc::now().naive_utc());
    form.apply(&mut model);
    Ok(model.update(db).await?)
}

pub async fn delete_prompt(db: &DatabaseConnection, actor: Actor, id: i32) -> Result<(), AppError> {
    let existing = prompts::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Prompt"))?;
    actor.authorize(existing.user_id)?;

    let txn = db.begin().await?;
    purge_interactions(&txn, Target::new(ContentKind::Prompt, id)).await?;
    existing.delete(&txn).await?;
    txn.commit().await?;
    Ok(())
}
