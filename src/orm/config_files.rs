use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "config_files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub config_id: i32,
    pub filename: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub language: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::configs::Entity",
        from = "Column::ConfigId",
        to = "super::configs::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Configs,
}

impl Related<super::configs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Configs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
