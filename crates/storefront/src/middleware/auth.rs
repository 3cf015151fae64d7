//! Authentication extractors.
//!
//! A customer is logged in when the session holds a [`CurrentCustomer`].

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::session::read_session_value;
use crate::models::{CurrentCustomer, session_keys};

/// Extractor that requires a logged-in customer.
///
/// HTML requests without one are redirected to `/auth/login`; JSON endpoints
/// get `401 Unauthorized`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(customer): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", customer.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentCustomer);

/// Error returned when authentication is required but the customer is not logged in.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for JSON requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Whether the request expects a JSON answer rather than a page.
fn wants_json(parts: &Parts) -> bool {
    if parts.uri.path().starts_with("/api/") {
        return true;
    }
    [axum::http::header::ACCEPT, axum::http::header::CONTENT_TYPE]
        .iter()
        .filter_map(|name| parts.headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains("application/json"))
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let rejection = if wants_json(parts) {
            AuthRejection::Unauthorized
        } else {
            AuthRejection::RedirectToLogin
        };

        // Set by SessionManagerLayer
        let Some(session) = parts.extensions.get::<Session>() else {
            return Err(AuthRejection::Unauthorized);
        };

        read_session_value::<CurrentCustomer>(session, session_keys::CURRENT_CUSTOMER)
            .await
            .map(Self)
            .ok_or(rejection)
    }
}

/// Extractor that optionally gets the current customer.
///
/// Unlike `RequireAuth`, this does not reject the request if the customer is not logged in.
pub struct OptionalAuth(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let customer = match parts.extensions.get::<Session>() {
            Some(session) => read_session_value(session, session_keys::CURRENT_CUSTOMER).await,
            None => None,
        };

        Ok(Self(customer))
    }
}

/// Store the logged-in customer in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Remove the logged-in customer from the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use loka_core::Email;
    use tower_sessions::MemoryStore;

    use super::*;

    fn parts(uri: &str, accept: Option<&str>, session: Option<Session>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(accept) = accept {
            builder = builder.header("accept", accept);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        parts
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_anonymous_page_request_redirects() {
        let mut parts = parts("/dashboard", None, Some(session()));
        let result = RequireAuth::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.err(), Some(AuthRejection::RedirectToLogin));
    }

    #[tokio::test]
    async fn test_anonymous_json_request_is_unauthorized() {
        let mut parts = parts("/cart/update/1", Some("application/json"), Some(session()));
        let result = RequireAuth::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.err(), Some(AuthRejection::Unauthorized));
    }

    #[tokio::test]
    async fn test_logged_in_customer_is_extracted() {
        let session = session();
        let customer = CurrentCustomer {
            email: Email::parse("made@loka.co").unwrap(),
            name: "Made".to_string(),
        };
        set_current_customer(&session, &customer).await.unwrap();

        let mut parts = parts("/dashboard", None, Some(session.clone()));
        let RequireAuth(found) = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(found, customer);

        clear_current_customer(&session).await.unwrap();
        let mut parts = self::parts("/", None, Some(session));
        let OptionalAuth(found) = OptionalAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
