use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::AppState;
use crate::error::AppError;

/// Resolves the caller and stores it as an [`AuthenticatedUser`] extension.
///
/// [`AuthenticatedUser`]: crate::auth::AuthenticatedUser
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = state.authenticator.authenticate(request.headers()).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
