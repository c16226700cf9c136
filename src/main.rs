mod database;
mod handlers;
mod listings;
mod models;
mod moderation;
mod ratings;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::env;

use crate::database::Database;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    let bind_address = format!("{}:{}", host, port);

    let database_url = env::var("DATABASE_URL").map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "DATABASE_URL must be set in environment",
        )
    })?;

    let db = Database::connect(&database_url).await.map_err(|err| {
        log::error!("Failed to initialize database: {err:?}");
        std::io::Error::new(std::io::ErrorKind::Other, err)
    })?;

    let db_data = web::Data::new(db);

    log::info!(
        "🚀 Starting LocalHub Business Directory on {}",
        bind_address
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(db_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                web::scope("/api/v1")
                    // Health
                    .service(handlers::health_check)
                    // Public directory
                    .service(handlers::home)
                    .service(handlers::search)
                    .service(handlers::category_listing)
                    .service(handlers::business_detail)
                    // Reviews
                    .service(handlers::submit_review)
                    .service(handlers::submit_review_reply)
                    // Owner listings
                    .service(handlers::create_business)
                    .service(handlers::update_business)
                    .service(handlers::delete_business)
                    // Accounts & profiles
                    .service(handlers::register_user)
                    .service(handlers::get_profile)
                    .service(handlers::update_profile)
                    // Staff moderation
                    .service(handlers::dashboard)
                    .service(handlers::approve_business)
                    .service(handlers::toggle_staff)
                    .service(handlers::delete_review),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
