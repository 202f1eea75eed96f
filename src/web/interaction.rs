use crate::comment::{create_comment, delete_comment, get_comment_tree, update_comment};
use crate::content::{ContentKind, Target};
use crate::error::AppError;
use crate::favorite::toggle_favorite;
use crate::middleware::ClientCtx;
use crate::vote::{toggle_vote, VoteValue};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_vote)
        .service(post_favorite)
        .service(view_comments)
        .service(post_comment)
        .service(update_comment_body)
        .service(destroy_comment);
}

#[derive(Debug, Deserialize)]
pub struct VoteForm {
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub body: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CommentUpdateForm {
    pub body: String,
}

#[post("/vote/{type}/{id}")]
async fn post_vote(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(String, i32)>,
    form: web::Json<VoteForm>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    let value = VoteValue::try_from(form.value)?;
    let (tag, id) = path.into_inner();
    let target = Target::from_tag(ContentKind::votable, &tag, id)?;

    let outcome = toggle_vote(db.get_ref(), user_id, target, value).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/favorite/{type}/{id}")]
async fn post_favorite(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(String, i32)>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    let (tag, id) = path.into_inner();
    let target = Target::from_tag(ContentKind::favoritable, &tag, id)?;

    let is_favorited = toggle_favorite(db.get_ref(), user_id, target).await?;
    Ok(HttpResponse::Ok().json(json!({ "is_favorited": is_favorited })))
}

#[get("/comments/{type}/{id}")]
async fn view_comments(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(String, i32)>,
) -> Result<impl Responder, AppError> {
    let (tag, id) = path.into_inner();
    let target = Target::from_tag(ContentKind::commentable, &tag, id)?;
    target.ensure_exists(db.get_ref()).await?;

    let comments = get_comment_tree(db.get_ref(), target, client.get_id()).await?;
    Ok(HttpResponse::Ok().json(json!({ "comments": comments })))
}

#[post("/comments/{type}/{id}")]
async fn post_comment(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<(String, i32)>,
    form: web::Json<CommentForm>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    let (tag, id) = path.into_inner();
    let target = Target::from_tag(ContentKind::commentable, &tag, id)?;

    let comment = create_comment(db.get_ref(), user_id, target, &form.body, form.parent_id).await?;
    Ok(HttpResponse::Created().json(json!({ "comment": comment })))
}

#[patch("/comments/{id}")]
async fn update_comment_body(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<CommentUpdateForm>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    let comment = update_comment(db.get_ref(), user_id, path.into_inner(), &form.body).await?;
    Ok(HttpResponse::Ok().json(json!({ "comment": comment })))
}

#[delete("/comments/{id}")]
async fn destroy_comment(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    delete_comment(db.get_ref(), user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
