use super::{author_name, discussion, per_page, AgentRef, ListQuery};
use crate::agent::list_agents;
use crate::content::{ContentKind, Target};
use crate::error::AppError;
use crate::frontend::{Page, PageResult};
use crate::integration::{render_skill, render_skill_md};
use crate::middleware::ClientCtx;
use crate::skill::{
    create_skill, delete_skill, get_skill_by_slug, list_skills, update_skill, SkillFilter,
    SkillForm,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_skills)
        .service(view_skill)
        .service(view_skill_md)
        .service(post_skill)
        .service(put_skill)
        .service(destroy_skill);
}

#[get("/skills")]
async fn view_skills(
    db: web::Data<DatabaseConnection>,
    query: web::Query<ListQuery>,
) -> PageResult {
    let filter = SkillFilter {
        search: query.search(),
        ..Default::default()
    };

    Page::new(
        "Skills/Index",
        json!({
            "skills": list_skills(db.get_ref(), &filter, query.sort, query.page(), per_page()).await?,
            "filters": &*query,
        }),
    )
}

#[get("/skills/{slug}")]
async fn view_skill(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> PageResult {
    let db = db.get_ref();
    let skill = get_skill_by_slug(db, &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Skill"))?;
    let skill_md = render_skill_md(&skill).map_err(|e| AppError::Internal(e.to_string()))?;

    let integrations: Vec<_> = list_agents(db)
        .await?
        .iter()
        .filter_map(|agent| {
            render_skill(agent, &skill)
                .map(|integration| json!({ "agent": AgentRef::from(agent), "integration": integration }))
        })
        .collect();

    let target = Target::new(ContentKind::Skill, skill.id);
    let (comments, interaction) = discussion(db, target, skill.vote_score, client.get_id()).await?;

    Page::new(
        "Skills/Show",
        json!({
            "username": author_name(db, skill.user_id).await?,
            "can_edit": client.can_modify(skill.user_id),
            "skill": skill,
            "skill_md": skill_md,
            "integrations": integrations,
            "comments": comments,
            "interaction": interaction,
        }),
    )
}

/// The rendered SKILL.md as a download.
#[get("/skills/{slug}/SKILL.md")]
async fn view_skill_md(
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let skill = get_skill_by_slug(db.get_ref(), &path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Skill"))?;
    let body = render_skill_md(&skill).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/markdown; charset=utf-8")
        .body(body))
}

#[post("/skills")]
async fn post_skill(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<SkillForm>,
) -> Result<impl Responder, AppError> {
    let user_id = client.require_user()?;
    let skill = create_skill(db.get_ref(), user_id, &form).await?;
    log::info!("user {} created skill {}", user_id, skill.slug);
    Ok(HttpResponse::Created().json(json!({ "skill": skill })))
}

#[put("/skills/{id}")]
async fn put_skill(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Json<SkillForm>,
) -> Result<impl Responder, AppError> {
    let skill = update_skill(db.get_ref(), client.actor()?, path.into_inner(), &form).await?;
    Ok(HttpResponse::Ok().json(json!({ "skill": skill })))
}

#[delete("/skills/{id}")]
async fn destroy_skill(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    delete_skill(db.get_ref(), client.actor()?, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
