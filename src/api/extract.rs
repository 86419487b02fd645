use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::CompanionError;

/// Accepts a JSON body or an urlencoded form and validates it. The
/// frontend posts forms for some endpoints and JSON for others.
pub struct JsonOrForm<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = CompanionError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let value = if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| CompanionError::InvalidInput(e.body_text()))?;
            value
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| CompanionError::InvalidInput(e.body_text()))?;
            value
        };

        value
            .validate()
            .map_err(|e| CompanionError::InvalidInput(e.to_string()))?;
        Ok(Self(value))
    }
}
