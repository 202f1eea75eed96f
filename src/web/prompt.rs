use super::{agent_filter, discussion, per_page, AgentRef, ListQuery};
use crate::agent::list_agents;
use crate::content::{ContentKind, Target};
use crate::error::AppError;
use crate::frontend::{Page, PageResult};
use crate::middleware::ClientCtx;
use crate::prompt::{
    create_prompt, delete_prompt, get_prompt_by_slug, list_prompts, update_prompt, PromptFilter,
    PromptForm,
};
use crate::taxonomy::{find_category_by_slug, list_categories};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_prompts)
        .service(view_prompt)
        .service(post_prompt)
        .service(put_prompt)
        .service(destroy_prompt);
}

#[get("/prompts")]
async fn view_prompts(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let db = db.get_ref();
    let agent = agent_filter(db, query.agent.as_deref()).await?;
    let category = match query.category.as_deref().filter(|s| !s.is_empty()) {
        Some(slug) => Some(
            find_category_by_slug(db, slug)
                .await?
                .ok_or(AppError::NotFound("Category"))?,
        ),
        None => None,
    };

    let filter = PromptFilter {
        agent_id: agent.as_ref().map(|a| a.id),
        category_id: category.as_ref().map(|c| c.id),
        search: query.search(),
        ..Default::default()
    };
    let agents: Vec<AgentRef> = list_agents(db).await?.iter().map(AgentRef::from).collect();

    Page::new(
        "Prompts/Index",
        json!({
            "prompts": list_prompts(db, &filter, query.sort, query.page(), per_page()).await?,
            "agents": agents,
            "categories": list_categories(db).await?,
            "filters": &*query,
        }),
    )
}

#[get("/prompts/{slug}")]
async fn view_prompt(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> PageResult {
    let db = db.get_ref();
    let prompt = get_prompt_by_slug(db, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Prompt"))?;

    let target = Target::new(ContentKind::Prompt, prompt.id);
    let (comments, interaction) = discussion(db, target, prompt.vote_score, client.get_id()).await?;

    Page::new(
        "Prompts/Show",
        json!({
            "can_edit": client.can_modify(prompt.user_id),
            "prompt": prompt,
            "comments": comments,
            "interaction": interaction,
        }),
    )
}

#[post("/prompts")]
async fn post_prompt(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<PromptForm>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    let prompt = create_prompt(db.get_ref(), user_id, &form).await?;
    log::info!("user {} created prompt {}", user_id, prompt.slug);
    Ok(HttpResponse::Created().json(json!({ "prompt": prompt })))
}

#[put("/prompts/{id}")]
async fn put_prompt(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<PromptForm>,
) -> Result<impl Responder, AppError> {
    let prompt = update_prompt(db.get_ref(), client.actor()?, path.into_inner(), &form).await?;
    Ok(HttpResponse::Ok().json(json!({ "prompt": prompt })))
}

#[delete("/prompts/{id}")]
async fn destroy_prompt(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    delete_prompt(db.get_ref(), client.actor()?, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
