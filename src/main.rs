mod auth;
mod config;
mod database;
mod error;
mod model;
mod review;

use actix_cors::Cors;
use actix_web::{
    error::{JsonPayloadError, PathError},
    middleware::Logger,
    web, App, HttpRequest, HttpResponse, HttpServer,
};
use auth::AuthService;
use config::Config;
use database::*;
use error::{AppError, Message};
use log::{debug, info};
use model::*;
use review::ReviewService;
use serde::{Deserialize, Serialize};
use std::io;

type Db = web::Data<sled::Db>;
type Auth = web::Data<AuthService>;
type Reviews = web::Data<ReviewService>;

fn require(field: &'static str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(format!("Malformed request body: {}", err)).into()
}

// The only path parameter is a movie id.
fn path_error(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    debug!("{}", err);
    AppError::NotFound("Movie").into()
}

fn message(success: bool, message: &str) -> Message {
    Message {
        success,
        message: message.to_owned(),
    }
}

#[derive(Serialize, Deserialize)]
struct CredentialParams {
    username: String,
    password: String,
}

impl CredentialParams {
    fn validate(&self) -> Result<(), AppError> {
        require("username", &self.username)?;
        require("password", &self.password)
    }
}

#[derive(Serialize, Deserialize)]
struct ReviewParams {
    username: String,
    review: String,
}

impl ReviewParams {
    fn validate(&self) -> Result<(), AppError> {
        require("username", &self.username)?;
        require("review", &self.review)
    }
}

#[derive(Serialize)]
struct Notice {
    message: &'static str,
}

async fn list_movies(db: Db) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(db.list_movies()?))
}

async fn populate_movies(db: Db) -> Result<HttpResponse, AppError> {
    let body = match db.seed_movies(&sample_movies())? {
        Some(ids) => {
            info!("seeded catalog with movies {:?}", ids);
            "Sample movies populated!"
        }
        None => "Sample movies already populated.",
    };
    Ok(HttpResponse::Ok().content_type("text/plain").body(body))
}

async fn add_review(
    movie_id: web::Path<u64>,
    params: web::Json<ReviewParams>,
    reviews: Reviews,
) -> Result<HttpResponse, AppError> {
    params.validate()?;
    reviews.add_review(movie_id.into_inner(), &params.username, &params.review)?;
    Ok(HttpResponse::Created().json(message(true, "Review added successfully!")))
}

async fn list_reviews(reviews: Reviews) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(reviews.list_reviews()?))
}

async fn register(
    params: web::Json<CredentialParams>,
    auth: Auth,
) -> Result<HttpResponse, AppError> {
    params.validate()?;
    let CredentialParams { username, password } = params.into_inner();
    web::block(move || auth.register(&username, &password)).await??;
    Ok(HttpResponse::Created().json(Notice {
        message: "User registered successfully!",
    }))
}

async fn login(params: web::Json<CredentialParams>, auth: Auth) -> Result<HttpResponse, AppError> {
    params.validate()?;
    let CredentialParams { username, password } = params.into_inner();
    let authenticated = web::block(move || auth.login(&username, &password)).await??;
    debug!("user {} logged in", authenticated.user_id);
    Ok(HttpResponse::Ok().json(message(true, "Login successful!")))
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .service(
            web::scope("/api")
                .wrap(Cors::permissive())
                .route("/movies", web::get().to(list_movies))
                .route("/populateMovies", web::get().to(populate_movies))
                .route("/movies/{id}/reviews", web::post().to(add_review))
                .route("/reviews", web::get().to(list_reviews))
                .route("/register", web::post().to(register))
                .route("/login", web::post().to(login)),
        );
}

fn startup_error<E>(err: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::Other, err)
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("movie_reviews=debug,actix_web=info"),
    )
    .init();

    let config = Config::load().map_err(startup_error)?;
    let db = config.open_database().map_err(startup_error)?;
    let auth = AuthService::new(db.clone(), config.bcrypt_cost).map_err(startup_error)?;
    let auth = web::Data::new(auth);
    let reviews = web::Data::new(ReviewService::new(db.clone()));
    let db_data = web::Data::new(db.clone());

    let address = config.address();
    info!("Server is running on http://{}", address);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db_data.clone())
            .app_data(auth.clone())
            .app_data(reviews.clone())
            .configure(routes)
    })
    .bind(&address)?
    .run()
    .await?;

    let flushed = db.flush_async().await.map_err(startup_error)?;
    info!("flushed {} bytes to the database before exit", flushed);
    Ok(())
}
