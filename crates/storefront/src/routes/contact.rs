//! Contact page route handlers.
//!
//! Messages are logged for the shop owner; nothing is stored or sent.

use axum::{
    Form, Json,
    extract::Query,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use loka_core::Email;

use super::auth::MessageQuery;
use crate::error::add_breadcrumb;

const SENT: &str = "Your message has been sent!";

/// Contact form data.
#[derive(Debug, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

/// A validated contact message.
#[derive(Debug, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: Email,
    pub message: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContactError {
    #[error("Name and message are required")]
    MissingFields,

    #[error("Please enter a valid email address")]
    InvalidEmail,
}

impl ContactForm {
    /// Trim and check the submitted fields.
    ///
    /// # Errors
    ///
    /// Returns `MissingFields` for a blank name or message and
    /// `InvalidEmail` for an unparseable address.
    pub fn validate(self) -> Result<ContactMessage, ContactError> {
        let name = self.name.trim();
        let message = self.message.trim();
        if name.is_empty() || message.is_empty() {
            return Err(ContactError::MissingFields);
        }
        let email = Email::parse(self.email.trim()).map_err(|_| ContactError::InvalidEmail)?;
        Ok(ContactMessage {
            name: name.to_owned(),
            email,
            message: message.to_owned(),
        })
    }
}

fn redirect_with(kind: &str, message: &str) -> Response {
    let message: String = url::form_urlencoded::byte_serialize(message.as_bytes()).collect();
    Redirect::to(&format!("/contact?{kind}={message}")).into_response()
}

/// Display the contact page.
pub async fn page(Query(query): Query<MessageQuery>) -> Json<MessageQuery> {
    Json(query)
}

/// Handle a contact form submission.
#[instrument(skip_all)]
pub async fn send(Form(form): Form<ContactForm>) -> Response {
    match form.validate() {
        Ok(contact) => {
            tracing::info!(
                email = %contact.email,
                name = %contact.name,
                length = contact.message.len(),
                "Contact message received"
            );
            add_breadcrumb("contact", "Contact message received", None);
            redirect_with("success", SENT)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Contact form rejected");
            redirect_with("error", &e.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{StatusCode, header};

    use super::*;

    fn form(name: &str, email: &str, message: &str) -> ContactForm {
        ContactForm {
            name: name.to_owned(),
            email: email.to_owned(),
            message: message.to_owned(),
        }
    }

    #[test]
    fn test_validate_trims_fields() {
        let contact = form("  Putu ", "putu@loka.co", " Is the sambal halal? ")
            .validate()
            .unwrap();
        assert_eq!(contact.name, "Putu");
        assert_eq!(contact.message, "Is the sambal halal?");
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert_eq!(
            form("Putu", "putu@loka.co", "   ").validate(),
            Err(ContactError::MissingFields)
        );
        assert_eq!(
            form("Putu", "not-an-email", "Hello").validate(),
            Err(ContactError::InvalidEmail)
        );
    }

    #[tokio::test]
    async fn test_send_redirects_with_message() {
        let response = send(Form(form("Putu", "putu@loka.co", "Hello"))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("/contact?success="));

        let response = send(Form(form("", "putu@loka.co", "Hello"))).await;
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert_eq!(location, "/contact?error=Name+and+message+are+required");
    }
}
