//! Sorting and pagination shared by every index page.

use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    Condition, ConnectionTrait, DbErr, EntityTrait, Order, PaginatorTrait,
    QueryOrder, Select, SelectorTrait,
};
use serde::{Deserialize, Serialize};

/// Index ordering chosen through `?sort=`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    /// Highest vote score first.
    Top,
    /// Newest first.
    #[default]
    New,
    /// Alphabetical by title or name.
    Name,
}

impl Sort {
    /// Orders `select` by the chosen key. Ties fall back to newest first.
    pub fn apply<E: EntityTrait>(
        self,
        select: Select<E>,
        vote_score: E::Column,
        created_at: E::Column,
        name: E::Column,
    ) -> Select<E> {
        match self {
            Self::Top => select
                .order_by(vote_score, Order::Desc)
                .order_by(created_at, Order::Desc),
            Self::New => select.order_by(created_at, Order::Desc),
            Self::Name => select.order_by(name, Order::Asc),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub total: u64,
}

/// One page of rows plus its position.
#[derive(Clone, Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// Highest page number accepted from a query string.
pub const MAX_PAGE: u64 = 100_000;

/// Page numbers start at 1. Anything lower, or absent, is page 1; anything
/// above `MAX_PAGE` is `MAX_PAGE`.
pub fn clamp_page(page: Option<i64>) -> u64 {
    match page {
        Some(page) if page > 1 => (page as u64).min(MAX_PAGE),
        _ => 1,
    }
}

/// Fetches page `page` (1-based) of `query`. A page past the end yields the
/// last page.
pub async fn paginate<'db, C, Q>(
    db: &'db C,
    query: Q,
    page: u64,
    per_page: u64,
) -> Result<Paginated<<Q::Selector as SelectorTrait>::Item>, DbErr>
where
    C: ConnectionTrait,
    Q: PaginatorTrait<'db, C>,
{
    let per_page = per_page.max(1);
    let paginator = query.paginate(db, per_page);
    let counts = paginator.num_items_and_pages().await?;
    let last_page = counts.number_of_pages.max(1);
    let page = page.clamp(1, last_page);
    let data = paginator.fetch_page(page - 1).await?;

    Ok(Paginated {
        data,
        meta: PageMeta {
            current_page: page,
            last_page,
            per_page,
            total: counts.number_of_items,
        },
    })
}

/// Case-insensitive substring match on any of `columns` of entity `E`.
/// `%` and `_` in the needle match themselves.
pub fn text_match<E: EntityTrait>(columns: &[E::Column], needle: &str) -> Condition {
    let pattern = like_pattern(needle);
    columns.iter().fold(Condition::any(), |cond, col| {
        cond.add(
            Expr::expr(Func::lower(Expr::col((E::default(), *col))))
                .like(LikeExpr::new(pattern.as_str()).escape('\\')),
        )
    })
}

fn like_pattern(needle: &str) -> String {
    let mut pattern = String::from("%");
    for c in needle.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(-4)), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page(Some(1)), 1);
        assert_eq!(clamp_page(Some(7)), 7);
        assert_eq!(clamp_page(Some(i64::MAX)), MAX_PAGE);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("  Rust "), "%rust%");
        assert_eq!(like_pattern("50%_x\\"), r"%50\%\_x\\%");
    }

    #[test]
    fn test_sort_from_query() {
        #[derive(Deserialize)]
        struct Query {
            #[serde(default)]
            sort: Sort,
        }
        let parse = |s: &str| serde_json::from_str::<Query>(s).unwrap().sort;
        assert_eq!(parse("{}"), Sort::New);
        assert_eq!(parse(r#"{"sort":"top"}"#), Sort::Top);
        assert_eq!(parse(r#"{"sort":"name"}"#), Sort::Name);
        assert!(serde_json::from_str::<Query>(r#"{"sort":"hot"}"#).is_err());
    }
}
