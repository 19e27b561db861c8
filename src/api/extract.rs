use axum::extract::FromRequest;

use crate::ServiceMapError;

/// `axum::Json` whose rejection is a [`ServiceMapError`], so malformed
/// bodies answer with the same JSON error shape as every other failure.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceMapError))]
pub struct ApiJson<T>(pub T);
