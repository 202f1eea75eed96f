//! Agent skills: a SKILL.md body plus frontmatter fields.

use crate::content::{Actor, ContentKind, Target};
use crate::error::AppError;
use crate::interaction::purge_interactions;
use crate::listing::{paginate, text_match, Paginated, Sort};
use crate::orm::{skills, users};
use crate::slug::unique_slug;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult,
    SelectModel, Selector, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Frontmatter `description` limit.
pub const MAX_DESCRIPTION_CHARS: usize = 1024;

#[derive(Clone, Debug, FromQueryResult, Serialize)]
pub struct SkillForList {
    pub id: i32,
    pub user_id: Option<i32>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub license: Option<String>,
    pub vote_score: i32,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    // join users
    pub username: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SkillFilter {
    pub user_id: Option<i32>,
    pub ids: Option<Vec<i32>>,
    pub search: Option<String>,
}

pub fn filtered(filter: &SkillFilter) -> Select<skills::Entity> {
    let mut query = skills::Entity::find();
    if let Some(id) = filter.user_id {
        query = query.filter(skills::Column::UserId.eq(id));
    }
    if let Some(ids) = &filter.ids {
        query = query.filter(skills::Column::Id.is_in(ids.clone()));
    }
    if let Some(q) = filter.search.as_deref().filter(|q| !q.trim().is_empty()) {
        query = query.filter(text_match::<skills::Entity>(
            &[skills::Column::Name, skills::Column::Description],
            q,
        ));
    }
    query
}

pub fn with_names(query: Select<skills::Entity>) -> Selector<SelectModel<SkillForList>> {
    query
        .select_only()
        .columns([
            skills::Column::Id,
            skills::Column::UserId,
            skills::Column::Name,
            skills::Column::Slug,
            skills::Column::Description,
            skills::Column::License,
            skills::Column::VoteScore,
            skills::Column::CreatedAt,
            skills::Column::UpdatedAt,
        ])
        .left_join(users::Entity)
        .column_as(users::Column::Name, "username")
        .into_model::<SkillForList>()
}

/// One sorted page of skills matching `filter`.
pub async fn list_skills<C: ConnectionTrait>(
    db: &C,
    filter: &SkillFilter,
    sort: Sort,
    page: u64,
    per_page: u64,
) -> Result<Paginated<SkillForList>, DbErr> {
    let query = sort.apply(
        filtered(filter),
        skills::Column::VoteScore,
        skills::Column::CreatedAt,
        skills::Column::Name,
    );
    paginate(db, with_names(query), page, per_page).await
}

pub async fn get_skill_by_slug<C: ConnectionTrait>(db: &C, slug: &str) -> Result<Option<skills::Model>, DbErr> {
    skills::Entity::find()
        .filter(skills::Column::Slug.eq(slug))
        .one(db)
        .await
}

#[derive(Clone, Debug, Deserialize)]
pub struct SkillForm {
    pub name: String,
    pub description: String,
    pub content: String,
    pub license: Option<String>,
    pub compatibility: Option<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

impl SkillForm {
    pub fn validate(&self) -> Result<(), AppError> {
        let name = self.name.trim().chars().count();
        if name == 0 || name > 64 {
            return Err(AppError::Validation("The name must be 1 to 64 characters.".to_owned()));
        }
        let description = self.description.trim().chars().count();
        if description == 0 || description > MAX_DESCRIPTION_CHARS {
            return Err(AppError::Validation(format!(
                "The description must be 1 to {} characters.",
                MAX_DESCRIPTION_CHARS
            )));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::Validation("The skill content is required.".to_owned()));
        }
        if self.allowed_tools.iter().any(|t| t.trim().is_empty() || t.contains(char::is_whitespace)) {
            return Err(AppError::Validation(
                "Tool names cannot be blank or contain spaces.".to_owned(),
            ));
        }
        Ok(())
    }

    fn apply(&self, model: &mut skills::ActiveModel) {
        model.name = Set(self.name.trim().to_owned());
        model.description = Set(self.description.trim().to_owned());
        model.content = Set(self.content.to_owned());
        model.license = Set(trimmed(&self.license));
        model.compatibility = Set(trimmed(&self.compatibility));
        model.allowed_tools = Set(Value::from(
            self.allowed_tools
                .iter()
                .map(|t| t.trim().to_owned())
                .collect::<Vec<_>>(),
        ));
        model.metadata = Set(Value::Object(
            self.metadata
                .iter()
                .map(|(k, v)| (k.to_owned(), Value::from(v.as_str())))
                .collect(),
        ));
    }
}

pub async fn create_skill(
    db: &DatabaseConnection,
    user_id: i32,
    form: &SkillForm,
) -> Result<skills::Model, AppError> {
    form.validate()?;
    let slug = unique_slug::<skills::Entity, _>(db, skills::Column::Slug, skills::Column::Id, &form.name, None).await?;

    let now = Utc::now().naive_utc();
    let mut model = skills::ActiveModel {
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

pub async fn update_skill(
    db: &DatabaseConnection,
    actor: Actor,
    id: i32,
    form: &SkillForm,
) -> Result<skills::Model, AppError> {
    let existing = skills::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Skill"))?;
    actor.authorize(existing.user_id)?;
    form.validate()?;

    let slug = unique_slug::<skills::Entity, _>(db, skills::Column::Slug, skills::Column::Id, &form.name, Some(id)).await?;
    let mut model: skills::ActiveModel = existing.into();
    model.slug = Set(slug);
    model.updated_at = Set(Utc::now().naive_utc());
    form.apply(&mut model);
    Ok(model.update(db).await?)
}

pub async fn delete_skill(db: &DatabaseConnection, actor: Actor, id: i32) -> Result<(), AppError> {
    let existing = skills::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Skill"))?;
    actor.authorize(existing.user_id)?;

    let txn = db.begin().await?;
    purge_interactions(&txn, Target::new(ContentKind::Skill, id)).await?;
    existing.delete(&txn).await?;
    txn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SkillForm {
        SkillForm {
            name: "pdf-tools".to_owned(),
            description: "Work with PDFs".to_owned(),
            content: "# PDF".to_owned(),
            license: None,
            compatibility: None,
            allowed_tools: vec!["Read".to_owned()],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validation() {
        assert!(form().validate().is_ok());

        let mut long = form();
        long.description = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(long.validate().is_err());

        let mut spaced = form();
        spaced.allowed_tools = vec!["Read Write".to_owned()];
        assert!(spaced.validate().is_err());

        let mut empty = form();
        empty.content = "  ".to_owned();
        assert!(empty.validate().is_err());
    }
}
