use sea_orm::entity::prelude::*;
use serde::Serialize;

/// An AI coding agent that content is scoped to.
///
/// The three template columns are admin-authored JSON documents. They are
/// validated against `crate::integration::template` when written and parsed
/// leniently when rendered.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "agents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub website: Option<String>,
    pub supports_mcp: bool,
    pub supports_skills: bool,
    /// Ordered list of transport names, e.g. `["stdio", "http"]`.
    pub mcp_transport_types: Json,
    pub mcp_config_template: Option<Json>,
    pub skills_config_template: Option<Json>,
    pub config_type_templates: Option<Json>,
    pub sort_order: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::configs::Entity")]
    Configs,
    #[sea_orm(has_many = "super::prompts::Entity")]
    Prompts,
}

impl Related<super::configs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Configs.def()
    }
}

impl Related<super::prompts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prompts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
