//! Login history recorder.
//!
//! Recording is off the critical path: failures are logged at `warn` and
//! never reach the login or logout response.

use chrono::Utc;
use tracing::instrument;

use loka_core::audit::{DeviceInfo, LoginRecord, NewLoginRecord};
use loka_core::order::Customer;
use loka_core::{Email, LoginRecordId};

use crate::db::LoginHistoryStore;

/// Request facts captured alongside a login.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

pub struct AuditRecorder<'a, S> {
    store: &'a S,
}

impl<'a, S> AuditRecorder<'a, S>
where
    S: LoginHistoryStore,
{
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Append a login record. Returns `None` if it could not be stored.
    #[instrument(skip(self, client), fields(email = %customer.email))]
    pub async fn record_login(
        &self,
        customer: &Customer,
        client: &ClientInfo,
        session_key: &str,
    ) -> Option<LoginRecord> {
        let new = NewLoginRecord {
            email: customer.email.clone(),
            name: customer.name.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            session_key: session_key.to_owned(),
            device: DeviceInfo::parse(&client.user_agent),
        };

        match self.store.record_login(&new).await {
            Ok(record) => {
                tracing::info!(
                    ip = %record.ip_address,
                    browser = %record.device.browser,
                    os = %record.device.os,
                    "Login recorded"
                );
                Some(record)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to record login");
                None
            }
        }
    }

    /// Close the most recent open record for `(email, session_key)`.
    #[instrument(skip(self, session_key), fields(email = %email))]
    pub async fn record_logout(&self, email: &Email, session_key: &str) -> Option<LoginRecordId> {
        match self.store.record_logout(email, session_key, Utc::now()).await {
            Ok(Some(id)) => {
                tracing::info!(record = %id, "Logout recorded");
                Some(id)
            }
            Ok(None) => {
                tracing::warn!("No open login record to close");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to record logout");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_logout_closes_matching_session_only() {
        let store = MemoryStore::new();
        let recorder = AuditRecorder::new(&store);
        let customer = Customer {
            email: Email::parse("made@loka.co").unwrap(),
            name: "Made".to_owned(),
        };
        let client = ClientInfo {
            ip_address: "203.0.113.7".to_owned(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".to_owned(),
        };

        let first = recorder.record_login(&customer, &client, "s1").await.unwrap();
        let second = recorder.record_login(&customer, &client, "s2").await.unwrap();
        assert_eq!(first.device.browser, "Firefox");

        assert_eq!(recorder.record_logout(&customer.email, "s2").await, Some(second.id));
        assert_eq!(recorder.record_logout(&customer.email, "s2").await, None);

        let stats = store.login_stats(Utc::now()).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
    }
}
