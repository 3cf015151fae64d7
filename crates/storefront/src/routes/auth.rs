//! Authentication route handlers.
//!
//! Login is a session flag: any well-formed email and non-empty password
//! logs the visitor in. Every login and logout is written to the login
//! history.

use std::net::SocketAddr;

use axum::{
    Form, Json,
    extract::{ConnectInfo, FromRequestParts, Query, State},
    http::{header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::{Expiry, Session};
use tracing::instrument;

use loka_core::Email;
use loka_core::audit::client_ip;
use loka_core::order::Customer;

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::session::remembered_expiry;
use crate::middleware::{OptionalAuth, clear_current_customer, set_current_customer};
use crate::models::CurrentCustomer;
use crate::services::audit::{AuditRecorder, ClientInfo};
use crate::state::AppState;

/// Shortest accepted password at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Checkbox; any non-empty value keeps the session for two weeks.
    #[serde(default)]
    pub remember: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Form validation failures, shown back on the form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("All fields are required")]
    MissingFields,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
}

impl LoginForm {
    fn validate(&self) -> std::result::Result<Customer, AuthError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let email = Email::parse(&self.email).map_err(|_| AuthError::InvalidEmail)?;
        let name = email.display_name();
        Ok(Customer { email, name })
    }

    fn remember(&self) -> bool {
        self.remember
            .as_deref()
            .is_some_and(|v| !matches!(v, "" | "false" | "0"))
    }
}

impl RegisterForm {
    fn validate(&self) -> std::result::Result<Customer, AuthError> {
        let name = self.name.trim();
        if name.is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
            || self.password_confirm.is_empty()
        {
            return Err(AuthError::MissingFields);
        }
        let email = Email::parse(&self.email).map_err(|_| AuthError::InvalidEmail)?;
        if self.password != self.password_confirm {
            return Err(AuthError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::PasswordTooShort);
        }
        Ok(Customer {
            email,
            name: name.to_owned(),
        })
    }
}

// =============================================================================
// Client info extractor
// =============================================================================

/// Client address and user agent of the current request.
pub struct RequestClient(pub ClientInfo);

impl<S> FromRequestParts<S> for RequestClient
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let header_str = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(ClientInfo {
            ip_address: client_ip(header_str("x-forwarded-for"), peer),
            user_agent: header_str(header::USER_AGENT.as_str())
                .unwrap_or_default()
                .to_owned(),
        }))
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn redirect_with_error(path: &str, err: &AuthError) -> Response {
    let message: String =
        url::form_urlencoded::byte_serialize(err.to_string().as_bytes()).collect();
    Redirect::to(&format!("{path}?error={message}")).into_response()
}

/// Log `customer` in on a fresh session id and record the login.
async fn start_session(
    state: &AppState,
    session: &Session,
    customer: Customer,
    client: &ClientInfo,
    expiry: Expiry,
) -> Result<()> {
    session.cycle_id().await?;
    session.set_expiry(Some(expiry));
    let current = CurrentCustomer {
        email: customer.email.clone(),
        name: customer.name.clone(),
    };
    set_current_customer(session, &current).await?;
    session.save().await?;

    let session_key = session.id().map(|id| id.to_string()).unwrap_or_default();
    AuditRecorder::new(state.store())
        .record_login(&customer, client, &session_key)
        .await;

    set_sentry_user(customer.email.as_str(), &customer.name);
    add_breadcrumb("auth", "Logged in", None);
    tracing::info!(email = %customer.email, "Customer logged in");
    Ok(())
}

/// Display the login page, or go to the dashboard if already logged in.
pub async fn login_page(
    OptionalAuth(customer): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if customer.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Json(query).into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(current): OptionalAuth,
    RequestClient(client): RequestClient,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    if current.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let customer = match form.validate() {
        Ok(customer) => customer,
        Err(e) => return Ok(redirect_with_error("/auth/login", &e)),
    };
    let expiry = if form.remember() {
        remembered_expiry()
    } else {
        Expiry::OnSessionEnd
    };

    start_session(&state, &session, customer, &client, expiry).await?;
    Ok(Redirect::to("/dashboard").into_response())
}

/// Display the registration page, or go to the dashboard if already logged in.
pub async fn register_page(
    OptionalAuth(customer): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if customer.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Json(query).into_response()
}

/// Handle registration form submission.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(current): OptionalAuth,
    RequestClient(client): RequestClient,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    if current.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let customer = match form.validate() {
        Ok(customer) => customer,
        Err(e) => return Ok(redirect_with_error("/auth/register", &e)),
    };

    start_session(&state, &session, customer, &client, remembered_expiry()).await?;
    Ok(Redirect::to("/dashboard").into_response())
}

/// Handle logout: close the login record and drop the whole session.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(current): OptionalAuth,
) -> Result<Redirect> {
    if let Some(customer) = current {
        let session_key = session.id().map(|id| id.to_string()).unwrap_or_default();
        AuditRecorder::new(state.store())
            .record_logout(&customer.email, &session_key)
            .await;
        clear_current_customer(&session).await?;
        tracing::info!(email = %customer.email, "Customer logged out");
    }

    session.flush().await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn register_form(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            name: "Komang".to_string(),
            email: "komang@loka.co".to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_login_derives_display_name() {
        let form = LoginForm {
            email: "ketut@loka.co".to_string(),
            password: "anything".to_string(),
            remember: Some("on".to_string()),
        };
        let customer = form.validate().unwrap();
        assert_eq!(customer.name, "Ketut");
        assert!(form.remember());
    }

    #[test]
    fn test_login_requires_credentials() {
        let form = LoginForm {
            email: "ketut@loka.co".to_string(),
            password: String::new(),
            remember: None,
        };
        assert_eq!(form.validate(), Err(AuthError::MissingCredentials));
        assert!(!form.remember());
    }

    #[test]
    fn test_register_validation() {
        assert!(register_form("rahasia", "rahasia").validate().is_ok());
        assert_eq!(
            register_form("rahasia", "berbeda").validate(),
            Err(AuthError::PasswordMismatch)
        );
        assert_eq!(
            register_form("abc", "abc").validate(),
            Err(AuthError::PasswordTooShort)
        );

        let mut missing = register_form("rahasia", "rahasia");
        missing.name = " ".to_string();
        assert_eq!(missing.validate(), Err(AuthError::MissingFields));
    }

    #[test]
    fn test_error_redirect_is_encoded() {
        let response = redirect_with_error("/auth/login", &AuthError::PasswordMismatch);
        let location = response.headers().get(header::LOCATION).unwrap();
        assert_eq!(location, "/auth/login?error=Passwords+do+not+match");
    }

    #[tokio::test]
    async fn test_request_client_prefers_forwarded_for() {
        let (mut parts, ()) = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header(header::USER_AGENT, "Mozilla/5.0 Firefox/128.0")
            .body(())
            .unwrap()
            .into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 2], 4000))));

        let RequestClient(client) = RequestClient::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(client.ip_address, "203.0.113.7");
        assert_eq!(client.user_agent, "Mozilla/5.0 Firefox/128.0");
    }

    #[tokio::test]
    async fn test_request_client_falls_back_to_peer() {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 4000))));

        let RequestClient(client) = RequestClient::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(client.ip_address, "192.168.1.9");
        assert!(client.user_agent.is_empty());
    }
}
