use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How an MCP server is reached.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Deserialize, Serialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Spawned as a child process from `command` and `args`.
    #[sea_orm(string_value = "local")]
    Local,
    /// Reached over the network at `url`.
    #[sea_orm(string_value = "remote")]
    Remote,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "mcp_servers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<i32>,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub server_type: ServerType,
    pub command: Option<String>,
    /// JSON array of strings.
    pub args: Json,
    /// JSON object of string values.
    pub env: Json,
    pub url: Option<String>,
    /// JSON object of string values.
    pub headers: Json,
    pub source_url: Option<String>,
    pub vote_score: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
