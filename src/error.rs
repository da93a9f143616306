use crate::database::StoreError;
use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("{0} not found.")]
    NotFound(&'static str),

    #[error("Username {0} is already taken.")]
    UsernameTaken(String),

    #[error("Database error")]
    Storage(#[from] StoreError),

    #[error("Hashing error")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Worker pool error")]
    Blocking,
}

impl From<BlockingError> for AppError {
    fn from(_: BlockingError) -> Self {
        AppError::Blocking
    }
}

#[derive(Serialize)]
pub struct Message {
    pub success: bool,
    pub message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UsernameTaken(_) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Hashing(_) | AppError::Blocking => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Storage(err) => error!("{:?}", err),
            AppError::Hashing(err) => error!("{:?}", err),
            AppError::Blocking => error!("blocking thread pool is gone"),
            _ => {}
        }
        HttpResponse::build(self.status_code()).json(Message {
            success: false,
            message: self.to_string(),
        })
    }
}
