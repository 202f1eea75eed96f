use crate::orm::*;
use once_cell::sync::OnceCell;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Returns the pool opened by `init_db`.
/// Panics if called before `init_db`.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL
        .get()
        .expect("get_db_pool() called before init_db()")
}

/// Opens the database URL and initializes the DB_POOL static.
pub async fn init_db(database_url: String) -> &'static DatabaseConnection {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(true);

    let pool = Database::connect(opt)
        .await
        .expect("Database connection was not established.");
    if DB_POOL.set(pool).is_err() {
        log::warn!("init_db() called twice; keeping the first pool");
    }

    get_db_pool()
}

/// Creates every table and composite index that does not exist yet.
/// Referenced tables are created before the tables pointing at them.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    macro_rules! create_tables {
        ($($entity:path),+ $(,)?) => {
            $(
                let mut stmt = schema.create_table_from_entity($entity);
                stmt.if_not_exists();
                db.execute(backend.build(&stmt)).await?;
            )+
        };
    }

    create_tables!(
        users::Entity,
        sessions::Entity,
        user_identities::Entity,
        agents::Entity,
        config_types::Entity,
        categories::Entity,
        configs::Entity,
        config_files::Entity,
        mcp_servers::Entity,
        prompts::Entity,
        skills::Entity,
        comments::Entity,
        votes::Entity,
        favorites::Entity,
    );

    for index in composite_indexes() {
        db.execute(backend.build(&index)).await?;
    }

    Ok(())
}

fn composite_indexes() -> Vec<IndexCreateStatement> {
    vec![
        unique_index(
            "votes_user_votable_unique",
            votes::Entity,
            [
                votes::Column::UserId,
                votes::Column::VotableType,
                votes::Column::VotableId,
            ],
        ),
        unique_index(
            "favorites_user_favoritable_unique",
            favorites::Entity,
            [
                favorites::Column::UserId,
                favorites::Column::FavoritableType,
                favorites::Column::FavoritableId,
            ],
        ),
        unique_index(
            "user_identities_provider_unique",
            user_identities::Entity,
            [
                user_identities::Column::Provider,
                user_identities::Column::ProviderId,
            ],
        ),
        Index::create()
            .if_not_exists()
            .name("comments_commentable_index")
            .table(comments::Entity)
            .col(comments::Column::CommentableType)
            .col(comments::Column::CommentableId)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("votes_votable_index")
            .table(votes::Entity)
            .col(votes::Column::VotableType)
            .col(votes::Column::VotableId)
            .to_owned(),
    ]
}

fn unique_index<E, const N: usize>(name: &str, entity: E, cols: [E::Column; N]) -> IndexCreateStatement
where
    E: EntityTrait,
{
    let mut index = Index::create();
    index.if_not_exists().name(name).table(entity).unique();
    for col in cols {
        index.col(col);
    }
    index.to_owned()
}
