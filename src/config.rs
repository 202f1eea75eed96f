//! Agent configurations: one or more files of a given config type.

use crate::content::{Actor, ContentKind, Target};
use crate::error::AppError;
use crate::interaction::purge_interactions;
use crate::listing::{paginate, text_match, Paginated, Sort};
use crate::orm::{agents, categories, config_files, config_types, configs, users};
use crate::slug::unique_slug;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult,
    SelectModel, Selector, TransactionTrait,
};
use serde::{Deserialize, Serialize};

const MAX_FILES: usize = 20;

/// A config row joined with the names its ids point at.
#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct ConfigForList {
    pub id: i32,
    pub user_id: Option<i32>,
    pub agent_id: i32,
    pub config_type_id: i32,
    pub category_id: Option<i32>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub vote_score: i32,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    // join users
    pub username: Option<String>,
    // join agents
    pub agent_name: Option<String>,
    pub agent_slug: Option<String>,
    // join config_types
    pub config_type_name: Option<String>,
    pub config_type_slug: Option<String>,
    // join categories
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
}

/// Narrows a config listing. Every field is optional.
#[derive(Clone, Debug, Default)]
pub struct ConfigFilter {
    pub agent_id: Option<i32>,
    pub config_type_id: Option<i32>,
    pub category_id: Option<i32>,
    pub user_id: Option<i32>,
    pub ids: Option<Vec<i32>>,
    pub search: Option<String>,
}

/// Base query for listings, still typed on the entity so it can be sorted.
pub fn filtered(filter: &ConfigFilter) -> Select<configs::Entity> {
    let mut query = configs::Entity::find();
    if let Some(id) = filter.agent_id {
        query = query.filter(configs::Column::AgentId.eq(id));
    }
    if let Some(id) = filter.config_type_id {
        query = query.filter(configs::Column::ConfigTypeId.eq(id));
    }
    if let Some(id) = filter.category_id {
        query = query.filter(configs::Column::CategoryId.eq(id));
    }
    if let Some(id) = filter.user_id {
        query = query.filter(configs::Column::UserId.eq(id));
    }
    if let Some(ids) = &filter.ids {
        query = query.filter(configs::Column::Id.is_in(ids.clone()));
    }
    if let Some(q) = filter.search.as_deref().filter(|q| !q.trim().is_empty()) {
        query = query.filter(text_match::<configs::Entity>(
            &[configs::Column::Title, configs::Column::Description],
            q,
        ));
    }
    query
}

/// Adds the joined name columns of `ConfigForList`.
pub fn with_names(query: Select<configs::Entity>) -> Selector<SelectModel<ConfigForList>> {
    query
        .left_join(users::Entity)
        .column_as(users::Column::Name, "username")
        .left_join(agents::Entity)
        .column_as(agents::Column::Name, "agent_name")
        .column_as(agents::Column::Slug, "agent_slug")
        .left_join(config_types::Entity)
        .column_as(config_types::Column::Name, "config_type_name")
        .column_as(config_types::Column::Slug, "config_type_slug")
        .left_join(categories::Entity)
        .column_as(categories::Column::Name, "category_name")
        .column_as(categories::Column::Slug, "category_slug")
        .into_model::<ConfigForList>()
}

/// One sorted page of configs matching `filter`.
pub async fn list_configs<C: ConnectionTrait>(
    db: &C,
    filter: &ConfigFilter,
    sort: Sort,
    page: u64,
    per_page: u64,
) -> Result<Paginated<ConfigForList>, DbErr> {
    let query = sort.apply(
        filtered(filter),
        configs::Column::VoteScore,
        configs::Column::CreatedAt,
        configs::Column::Title,
    );
    paginate(db, with_names(query), page, per_page).await
}

pub async fn get_config_by_slug<C: ConnectionTrait>(db: &C, slug: &str) -> Result<Option<ConfigForList>, DbErr> {
    with_names(configs::Entity::find().filter(configs::Column::Slug.eq(slug)))
        .one(db)
        .await
}

/// Files of a config in display order.
pub async fn get_config_files<C: ConnectionTrait>(db: &C, config_id: i32) -> Result<Vec<config_files::Model>, DbErr> {
    config_files::Entity::find()
        .filter(config_files::Column::ConfigId.eq(config_id))
        .order_by_asc(config_files::Column::SortOrder)
        .order_by_asc(config_files::Column::Id)
        .all(db)
        .await
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConfigFileForm {
    pub filename: String,
    pub content: String,
    pub language: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConfigForm {
    pub title: String,
    pub description: Option<String>,
    pub agent_id: i32,
    pub config_type_id: i32,
    pub category_id: Option<i32>,
    pub files: Vec<ConfigFileForm>,
}

impl ConfigForm {
    pub fn validate(&self) -> Result<(), AppError> {
        let title = self.title.trim().chars().count();
        if title == 0 || title > 255 {
            return Err(AppError::Validation("The title must be 1 to 255 characters.".to_owned()));
        }
        if self.files.is_empty() {
            return Err(AppError::Validation("A config needs at least one file.".to_owned()));
        }
        if self.files.len() > MAX_FILES {
            return Err(AppError::Validation(format!(
                "A config may have at most {} files.",
                MAX_FILES
            )));
        }
        for file in &self.files {
            let name = file.filename.trim();
            if name.is_empty() || name.chars().count() > 255 {
                return Err(AppError::Validation(
                    "Every file needs a filename of at most 255 characters.".to_owned(),
                ));
            }
            if file.content.trim().is_empty() {
                return Err(AppError::Validation(format!("{} is empty.", name)));
            }
        }
        Ok(())
    }

    /// Index of the primary file: the first one flagged, else the first one.
    pub fn primary_index(&self) -> usize {
        self.files.iter().position(|f| f.is_primary).unwrap_or(0)
    }

    fn description(&self) -> Option<String> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned)
    }

    async fn check_references<C: ConnectionTrait>(&self, db: &C) -> Result<(), AppError> {
        if agents::Entity::find_by_id(self.agent_id).count(db).await? == 0 {
            return Err(AppError::Validation("The selected agent is invalid.".to_owned()));
        }
        if config_types::Entity::find_by_id(self.config_type_id).count(db).await? == 0 {
            return Err(AppError::Validation("The selected config type is invalid.".to_owned()));
        }
        if let Some(category_id) = self.category_id {
            if categories::Entity::find_by_id(category_id).count(db).await? == 0 {
                return Err(AppError::Validation("The selected category is invalid.".to_owned()));
            }
        }
        Ok(())
    }

    async fn insert_files<C: ConnectionTrait>(&self, db: &C, config_id: i32) -> Result<(), DbErr> {
        let primary = self.primary_index();
        let files = self
            .files
            .iter()
            .enumerate()
            .map(|(i, file)| config_files::ActiveModel {
                config_id: Set(config_id),
                filename: Set(file.filename.trim().to_owned()),
                content: Set(file.content.to_owned()),
                language: Set(file
                    .language
                    .as_deref()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_owned)),
                is_primary: Set(i == primary),
                sort_order: Set(i as i32),
                ..Default::default()
            });
        config_files::Entity::insert_many(files).exec(db).await?;
        Ok(())
    }
}

pub async fn create_config(
    db: &DatabaseConnection,
    user_id: i32,
    form: &ConfigForm,
) -> Result<configs::Model, AppError> {
    form.validate()?;
    form.check_references(db).await?;

    let txn = db.begin().await?;
    let slug = unique_slug::<configs::Entity, _>(&txn, configs::Column::Slug, configs::Column::Id, &form.title, None).await?;
    let now = Utc::now().naive_utc();
    let config = configs::ActiveModel {
        user_id: Set(Some(user_id)),
        agent_id: Set(form.agent_id),
        config_type_id: Set(form.config_type_id),
        category_id: Set(form.category_id),
        title: Set(form.title.trim().to_owned()),
        slug: Set(slug),
        description: Set(form.description()),
        vote_score: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    form.insert_files(&txn, config.id).await?;
    txn.commit().await?;

    Ok(config)
}

/// Replaces the config's fields and files. The slug follows the title.
pub async fn update_config(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    form: &ConfigForm,
) -> Result<configs::Model, AppError> {
    let existing = configs::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Config"))?;
    actor.authorize(existing.user_id)?;
    form.validate()?;
    form.check_references(db).await?;

    let txn = db.begin().await?;
    let slug = unique_slug::<configs::Entity, _>(&txn, configs::Column::Slug, configs::Column::Id, &form.title, Some(id)).await?;
    let mut model: configs::ActiveModel = existing.into();
    model.agent_id = Set(form.agent_id);
    model.config_type_id = Set(form.config_type_id);
    model.category_id = Set(form.category_id);
    model.title = Set(form.title.trim().to_owned());
    model.slug = Set(slug);
    model.description = Set(form.description());
    model.updated_at = Set(Utc::now().naive_utc());
    let config = model.update(&txn).await?;

    config_files::Entity::delete_many()
        .filter(config_files::Column::ConfigId.eq(id))
        .exec(&txn)
        .await?;
    form.insert_files(&txn, id).await?;
    txn.commit().await?;

    Ok(config)
}

pub async fn delete_config(db: &DatabaseConnection, actor: Actor, id: i32) -> Result<(), AppError> {
    let existing = configs::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Config"))?;
    actor.authorize(existing.user_id)?;

    let txn = db.begin().await?;
    purge_interactions(&txn, Target::new(ContentKind::Config, id)).await?;
    config_files::Entity::delete_many()
        .filter(config_files::Column::ConfigId.eq(id))
        .exec(&txn)
        .await?;
    existing.delete(&txn).await?;
    txn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, primary: bool) -> ConfigFileForm {
        ConfigFileForm {
            filename: name.to_owned(),
            content: "x".to_owned(),
            language: None,
            is_primary: primary,
        }
    }

    fn form(files: Vec<ConfigFileForm>) -> ConfigForm {
        ConfigForm {
            title: "Strict TypeScript rules".to_owned(),
            description: None,
            agent_id: 1,
            config_type_id: 1,
            category_id: None,
            files,
        }
    }

    #[test]
    fn test_primary_file() {
        assert_eq!(form(vec![file("a", false), file("b", false)]).primary_index(), 0);
        assert_eq!(form(vec![file("a", false), file("b", true)]).primary_index(), 1);
        assert_eq!(
            form(vec![file("a", false), file("b", true), file("c", true)]).primary_index(),
            1
        );
    }

    #[test]
    fn test_validation() {
        assert!(form(vec![file("CLAUDE.md", false)]).validate().is_ok());
        assert!(form(vec![]).validate().is_err());
        assert!(form(vec![file("  ", false)]).validate().is_err());

        let mut blank = form(vec![file("CLAUDE.md", false)]);
        blank.files[0].content = "\n ".to_owned();
        assert!(blank.validate().is_err());

        let mut untitled = form(vec![file("CLAUDE.md", false)]);
        untitled.title = " ".to_owned();
        assert!(untitled.validate().is_err());
    }
}
