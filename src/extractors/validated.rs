//! Bind a JSON body and run its declared validation before the handler sees it.

use crate::error::AppError;
use crate::logging::log_incoming;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use validator::Validate;

/// JSON body of type `T` that passed `Validate`. Bind failures and violations reject with 400.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

/// JSON array body whose every element passed `Validate`. The first invalid element rejects with 400.
#[derive(Debug, Clone)]
pub struct ValidatedBatch<T>(pub Vec<T>);

async fn bind<S, T>(req: Request, state: &S) -> Result<T, AppError>
where
    S: Send + Sync,
    T: DeserializeOwned + Serialize,
{
    let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
        let msg = rejection.body_text();
        tracing::warn!(error = %msg, "failed to bind incoming object");
        AppError::BadRequest(msg)
    })?;
    log_incoming(&value);
    Ok(value)
}

fn check<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(|e| {
        tracing::warn!(error = %e, "failed to validate incoming object");
        AppError::Validation(e.to_string())
    })
}

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Serialize + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value: T = bind(req, state).await?;
        check(&value)?;
        Ok(ValidatedJson(value))
    }
}

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedBatch<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Serialize + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let items: Vec<T> = bind(req, state).await?;
        for item in &items {
            check(item)?;
        }
        Ok(ValidatedBatch(items))
    }
}
