//! Request extractors.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

use crate::{error::AppError, models::validation::Validate};

/// JSON body that has been parsed, normalized and validated.
///
/// Unparseable bodies, missing fields and fields that fail validation are
/// all reported as `AppError::Validation` (or the request type's own error),
/// so the handler only ever sees a well-formed request.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::Validation(rejection.body_text()))?;

        value.normalize();
        value.validate()?;

        Ok(Self(value))
    }
}
