use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter};

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lowercase ASCII words joined by single dashes.
pub fn slugify(title: &str) -> String {
    NON_ALNUM
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_owned()
}

/// Derives a slug from `title` that no other row of `E` uses.
/// `except` is the id of the row being updated, which may keep its own slug.
pub async fn unique_slug<E, C>(
    db: &C,
    slug_col: E::Column,
    id_col: E::Column,
    title: &str,
    except: Option<i32>,
) -> Result<String, DbErr>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let mut base = slugify(title);
    if base.is_empty() {
        base = "untitled".to_owned();
    }

    let mut candidate = base.to_owned();
    let mut n = 1;
    loop {
        let mut query = E::find().filter(slug_col.eq(candidate.as_str()));
        if let Some(id) = except {
            query = query.filter(id_col.ne(id));
        }
        if query.count(db).await? == 0 {
            return Ok(candidate);
        }
        n += 1;
        candidate = format!("{}-{}", base, n);
    }
}
