//! Polymorphic content targets.
//!
//! Votes, favorites and comments attach to content through a
//! `(ContentKind, id)` pair. Client-supplied type tags are resolved through a
//! per-operation allow-list; a tag never names a table directly.

use crate::error::AppError;
use crate::orm::{comments, configs, mcp_servers, prompts, skills};
use sea_orm::entity::prelude::*;
use sea_orm::{sea_query::Expr, ConnectionTrait, PaginatorTrait};
use serde::Serialize;

/// Every kind of record that can be the target of an interaction.
/// Stored in the `*_type` columns of votes, favorites and comments.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    #[sea_orm(string_value = "config")]
    Config,
    #[sea_orm(string_value = "mcp_server")]
    McpServer,
    #[sea_orm(string_value = "prompt")]
    Prompt,
    #[sea_orm(string_value = "skill")]
    Skill,
    #[sea_orm(string_value = "comment")]
    Comment,
}

impl ContentKind {
    /// The tag used in URLs and request bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::McpServer => "mcp-server",
            Self::Prompt => "prompt",
            Self::Skill => "skill",
            Self::Comment => "comment",
        }
    }

    /// Kinds that accept votes.
    pub fn votable(tag: &str) -> Option<Self> {
        match tag {
            "config" => Some(Self::Config),
            "mcp-server" => Some(Self::McpServer),
            "prompt" => Some(Self::Prompt),
            "skill" => Some(Self::Skill),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }

    /// Kinds that can be favorited.
    pub fn favoritable(tag: &str) -> Option<Self> {
        match tag {
            "config" => Some(Self::Config),
            "mcp-server" => Some(Self::McpServer),
            "prompt" => Some(Self::Prompt),
            "skill" => Some(Self::Skill),
            _ => None,
        }
    }

    /// Kinds that accept comments.
    pub fn commentable(tag: &str) -> Option<Self> {
        Self::favoritable(tag)
    }

    /// Human name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config => "Config",
            Self::McpServer => "MCP server",
            Self::Prompt => "Prompt",
            Self::Skill => "Skill",
            Self::Comment => "Comment",
        }
    }
}

/// A resolved interaction target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    pub kind: ContentKind,
    pub id: i32,
}

impl Target {
    pub fn new(kind: ContentKind, id: i32) -> Self {
        Self { kind, id }
    }

    /// Resolves a client tag through `allow`, rejecting anything it does not list.
    pub fn from_tag(
        allow: fn(&str) -> Option<ContentKind>,
        tag: &str,
        id: i32,
    ) -> Result<Self, AppError> {
        allow(tag)
            .map(|kind| Self { kind, id })
            .ok_or_else(|| AppError::Validation("Unsupported content type.".to_owned()))
    }

    pub async fn exists<C: ConnectionTrait>(&self, db: &C) -> Result<bool, DbErr> {
        let count = match self.kind {
            ContentKind::Config => configs::Entity::find_by_id(self.id).count(db).await?,
            ContentKind::McpServer => mcp_servers::Entity::find_by_id(self.id).count(db).await?,
            ContentKind::Prompt => prompts::Entity::find_by_id(self.id).count(db).await?,
            ContentKind::Skill => skills::Entity::find_by_id(self.id).count(db).await?,
            ContentKind::Comment => comments::Entity::find_by_id(self.id).count(db).await?,
        };
        Ok(count > 0)
    }

    /// Fails with `NotFound` when the target row is missing.
    pub async fn ensure_exists<C: ConnectionTrait>(&self, db: &C) -> Result<(), AppError> {
        if self.exists(db).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(self.kind.label()))
        }
    }
}

/// A signed-in user acting on content.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub is_admin: bool,
}

impl Actor {
    /// Owners may change their content. Admins may change anything.
    pub fn authorize(&self, owner_id: Option<i32>) -> Result<(), AppError> {
        if self.is_admin || owner_id == Some(self.user_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden("You do not have permission to change this."))
        }
    }
}

/// Entities that cache the sum of their votes in a `vote_score` column.
pub trait HasVoteScore: EntityTrait {
    fn id_column() -> Self::Column;
    fn vote_score_column() -> Self::Column;
}

macro_rules! has_vote_score {
    ($($module:ident),+) => {
        $(
            impl HasVoteScore for $module::Entity {
                fn id_column() -> Self::Column {
                    $module::Column::Id
                }
                fn vote_score_column() -> Self::Column {
                    $module::Column::VoteScore
                }
            }
        )+
    };
}

has_vote_score!(configs, mcp_servers, prompts, skills);

/// Writes `score` into the `vote_score` column of row `id`.
pub async fn store_vote_score<E, C>(db: &C, id: i32, score: i32) -> Result<(), DbErr>
where
    E: HasVoteScore,
    C: ConnectionTrait,
{
    E::update_many()
        .col_expr(E::vote_score_column(), Expr::value(score))
        .filter(E::id_column().eq(id))
        .exec(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_allow_lists() {
        assert_eq!(ContentKind::votable("comment"), Some(ContentKind::Comment));
        assert_eq!(ContentKind::favoritable("comment"), None);
        assert_eq!(ContentKind::commentable("comment"), None);
        assert_eq!(
            ContentKind::commentable("mcp-server"),
            Some(ContentKind::McpServer)
        );
        // Stored names and class-like strings are not accepted tags.
        assert_eq!(ContentKind::votable("mcp_server"), None);
        assert_eq!(ContentKind::votable("App\\Models\\User"), None);
        assert_eq!(ContentKind::votable("users"), None);
    }

    #[test]
    fn test_tags_round_trip_through_allow_list() {
        for kind in ContentKind::iter() {
            assert_eq!(ContentKind::votable(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn test_target_from_unknown_tag() {
        let err = Target::from_tag(ContentKind::votable, "user", 1).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_actor_authorize() {
        let owner = Actor { user_id: 1, is_admin: false };
        let admin = Actor { user_id: 2, is_admin: true };
        assert!(owner.authorize(Some(1)).is_ok());
        assert!(matches!(owner.authorize(Some(3)), Err(AppError::Forbidden(_))));
        assert!(owner.authorize(None).is_err());
        assert!(admin.authorize(Some(1)).is_ok());
        assert!(admin.authorize(None).is_ok());
    }

    #[test]
    fn test_kind_serializes_as_tag() {
        let json = serde_json::to_string(&ContentKind::McpServer).unwrap();
        assert_eq!(json, "\"mcp-server\"");
    }
}
