use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{db::StoreError, error::HttpError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Profile not found for user {0}")]
    ProfileNotFound(Uuid),

    #[error("Invalid promo code: {0}")]
    InvalidPromoCode(String),

    #[error("Cannot use your own promo code")]
    SelfReferral,

    #[error("Insufficient points: required {required}, available {available}")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("Could not allocate a unique promo code after {0} attempts")]
    PromoCodeExhausted(u32),

    #[error("A user with email {0} already exists")]
    EmailTaken(String),

    #[error("Email or password is wrong")]
    WrongCredentials,

    #[error("Session is invalid: {0}")]
    InvalidSession(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ProfileNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::InvalidPromoCode(_)
            | ServiceError::SelfReferral
            | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            ServiceError::WrongCredentials | ServiceError::InvalidSession(_) => {
                StatusCode::UNAUTHORIZED
            }

            ServiceError::InsufficientPoints { .. } => StatusCode::PAYMENT_REQUIRED,

            ServiceError::EmailTaken(_) => StatusCode::CONFLICT,

            ServiceError::PromoCodeExhausted(_)
            | ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        match error {
            // Store internals stay in the logs
            ServiceError::Store(ref err) => {
                tracing::error!("Store failure: {}", err);
                HttpError::new("Server Error. Please try again later", status)
            }
            _ => HttpError::new(error.to_string(), status),
        }
    }
}
