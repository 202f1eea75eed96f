//! Config types and categories. Both are admin-managed name/slug pairs.

use crate::content::{ContentKind, Target};
use crate::error::AppError;
use crate::interaction::purge_interactions;
use crate::orm::{categories, config_files, config_types, configs, prompts};
use crate::slug::{slugify, unique_slug};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct TaxonomyForm {
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
}

impl TaxonomyForm {
    fn validate(&self) -> Result<(), AppError> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(AppError::Validation("The name must be 1 to 100 characters.".to_owned()));
        }
        if let Some(slug) = &self.slug {
            if slugify(slug).is_empty() {
                return Err(AppError::Validation("The slug is invalid.".to_owned()));
            }
        }
        Ok(())
    }

    fn slug_source(&self) -> &str {
        self.slug.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(&self.name)
    }

    fn description(&self) -> Option<String> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ConfigTypeWithCount {
    #[serde(flatten)]
    pub config_type: config_types::Model,
    pub configs_count: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: categories::Model,
    pub configs_count: u64,
    pub prompts_count: u64,
}

#[derive(Debug, FromQueryResult)]
struct GroupCount {
    group_id: Option<i32>,
    count: i64,
}

fn into_count_map(rows: Vec<GroupCount>) -> HashMap<i32, u64> {
    rows.into_iter()
        .filter_map(|row| row.group_id.map(|id| (id, row.count.max(0) as u64)))
        .collect()
}

/// Config counts per config type, optionally for a single agent.
pub async fn config_counts_by_type<C: ConnectionTrait>(
    db: &C,
    agent_id: Option<i32>,
) -> Result<HashMap<i32, u64>, DbErr> {
    let mut query = configs::Entity::find()
        .select_only()
        .column_as(configs::Column::ConfigTypeId, "group_id")
        .column_as(Expr::col(configs::Column::Id).count(), "count")
        .group_by(configs::Column::ConfigTypeId);
    if let Some(agent_id) = agent_id {
        query = query.filter(configs::Column::AgentId.eq(agent_id));
    }
    Ok(into_count_map(query.into_model::<GroupCount>().all(db).await?))
}

pub async fn list_config_types<C: ConnectionTrait>(
    db: &C,
    agent_id: Option<i32>,
) -> Result<Vec<ConfigTypeWithCount>, DbErr> {
    let counts = config_counts_by_type(db, agent_id).await?;
    Ok(config_types::Entity::find()
        .order_by_asc(config_types::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|config_type| ConfigTypeWithCount {
            configs_count: counts.get(&config_type.id).copied().unwrap_or(0),
            config_type,
        })
        .collect())
}

pub async fn list_categories<C: ConnectionTrait>(db: &C) -> Result<Vec<CategoryWithCount>, DbErr> {
    let config_counts = into_count_map(
        configs::Entity::find()
            .select_only()
            .column_as(configs::Column::CategoryId, "group_id")
            .column_as(Expr::col(configs::Column::Id).count(), "count")
            .group_by(configs::Column::CategoryId)
            .into_model::<GroupCount>()
            .all(db)
            .await?,
    );
    let prompt_counts = into_count_map(
        prompts::Entity::find()
            .select_only()
            .column_as(prompts::Column::CategoryId, "group_id")
            .column_as(Expr::col(prompts::Column::Id).count(), "count")
            .group_by(prompts::Column::CategoryId)
            .into_model::<GroupCount>()
            .all(db)
            .await?,
    );

    Ok(categories::Entity::find()
        .order_by_asc(categories::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|category| CategoryWithCount {
            configs_count: config_counts.get(&category.id).copied().unwrap_or(0),
            prompts_count: prompt_counts.get(&category.id).copied().unwrap_or(0),
            category,
        })
        .collect())
}

pub async fn find_config_type_by_slug<C: ConnectionTrait>(
    db: &C,
    slug: &str,
) -> Result<Option<config_types::Model>, DbErr> {
    config_types::Entity::find()
        .filter(config_types::Column::Slug.eq(slug))
        .one(db)
        .await
}

pub async fn find_category_by_slug<C: ConnectionTrait>(
    db: &C,
    slug: &str,
) -> Result<Option<categories::Model>, DbErr> {
    categories::Entity::find()
        .filter(categories::Column::Slug.eq(slug))
        .one(db)
        .await
}

pub async fn create_config_type(
    db: &DatabaseConnection,
    form: &TaxonomyForm,
) -> Result<config_types::Model, AppError> {
    form.validate()?;
    let slug = unique_slug::<config_types::Entity, _>(
        db,
        config_types::Column::Slug,
        config_types::Column::Id,
        form.slug_source(),
        None,
    )
    .await?;

    Ok(config_types::ActiveModel {
        name: Set(form.name.trim().to_owned()),
        slug: Set(slug),
        description: Set(form.description()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn update_config_type(
    db: &DatabaseConnection,
    id: i32,
    form: &TaxonomyForm,
) -> Result<config_types::Model, AppError> {
    form.validate()?;
    let existing = config_types::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Config type"))?;
    let slug = unique_slug::<config_types::Entity, _>(
        db,
        config_types::Column::Slug,
        config_types::Column::Id,
        form.slug_source(),
        Some(id),
    )
    .await?;

    let mut model: config_types::ActiveModel = existing.into();
    model.name = Set(form.name.trim().to_owned());
    model.slug = Set(slug);
    model.description = Set(form.description());
    Ok(model.update(db).await?)
}

/// Removes the config type and every config of that type.
pub async fn delete_config_type(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let existing = config_types::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Config type"))?;

    let txn = db.begin().await?;
    let config_ids: Vec<i32> = configs::Entity::find()
        .select_only()
        .column(configs::Column::Id)
        .filter(configs::Column::ConfigTypeId.eq(id))
        .into_tuple()
        .all(&txn)
        .await?;
    for config_id in &config_ids {
        purge_interactions(&txn, Target::new(ContentKind::Config, *config_id)).await?;
    }
    config_files::Entity::delete_many()
        .filter(config_files::Column::ConfigId.is_in(config_ids.clone()))
        .exec(&txn)
        .await?;
    configs::Entity::delete_many()
        .filter(configs::Column::ConfigTypeId.eq(id))
        .exec(&txn)
        .await?;
    existing.delete(&txn).await?;
    txn.commit().await?;

    log::info!("deleted config type {} with {} configs", id, config_ids.len());
    Ok(())
}

pub async fn create_category(
    db: &DatabaseConnection,
    form: &TaxonomyForm,
) -> Result<categories::Model, AppError> {
    form.validate()?;
    let slug = unique_slug::<categories::Entity, _>(
        db,
        categories::Column::Slug,
        categories::Column::Id,
        form.slug_source(),
        None,
    )
    .await?;

    Ok(categories::ActiveModel {
        name: Set(form.name.trim().to_owned()),
        slug: Set(slug),
        description: Set(form.description()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn update_category(
    db: &DatabaseConnection,
    id: i32,
    form: &TaxonomyForm,
) -> Result<categories::Model, AppError> {
    form.validate()?;
    let existing = categories::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    let slug = unique_slug::<categories::Entity, _>(
        db,
        categories::Column::Slug,
        categories::Column::Id,
        form.slug_source(),
        Some(id),
    )
    .await?;

    let mut model: categories::ActiveModel = existing.into();
    model.name = Set(form.name.trim().to_owned());
    model.slug = Set(slug);
    model.description = Set(form.description());
    Ok(model.update(db).await?)
}

/// Content in the category stays, uncategorized.
pub async fn delete_category(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let existing = categories::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Category"))?;

    let txn = db.begin().await?;
    configs::Entity::update_many()
        .col_expr(configs::Column::CategoryId, Expr::value(Option::<i32>::None))
        .filter(configs::Column::CategoryId.eq(id))
        .exec(&txn)
        .await?;
    prompts::Entity::update_many()
        .col_expr(prompts::Column::CategoryId, Expr::value(Option::<i32>::None))
        .filter(prompts::Column::CategoryId.eq(id))
        .exec(&txn)
        .await?;
    existing.delete(&txn).await?;
    txn.commit().await?;
    Ok(())
}
