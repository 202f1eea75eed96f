use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use agentshelf::db::{create_schema, init_db};
use agentshelf::global::get_settings;
use agentshelf::middleware::ClientCtx;
use env_logger::Env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_lib_mods();
    init_our_mods();

    let settings = get_settings();
    let pool = init_db(std::env::var("DATABASE_URL").expect("DATABASE_URL must be set.")).await;
    if settings.auto_migrate {
        create_schema(pool)
            .await
            .expect("Schema creation failed.");
        log::info!("schema is up to date");
    }

    let secret_key = match &settings.secret_key {
        Some(key) => Key::from(key.as_bytes()),
        None => {
            log::warn!("SECRET_KEY is not set; sessions will not survive a restart");
            Key::generate()
        }
    };

    log::info!("listening on {}", settings.bind_address);
    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        // However, services are read top->down, higher traffic routes should be
        // placed higher
        App::new()
            .app_data(Data::new(pool.clone()))
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, agentshelf::web::error::render_404)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        agentshelf::web::error::render_500,
                    ),
            )
            .wrap(ClientCtx::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                secret_key.clone(),
            ))
            .wrap(Logger::new("%a %{User-Agent}i"))
            .configure(agentshelf::web::configure)
    })
    .bind(&settings.bind_address)?
    .run()
    .await
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
/// Panics
pub fn init_our_mods() {
    agentshelf::global::init();
}
