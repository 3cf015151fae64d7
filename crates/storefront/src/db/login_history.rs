//! `PostgreSQL` login history queries.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use loka_core::audit::{DeviceInfo, LoginRecord, NewLoginRecord};
use loka_core::{Email, LoginRecordId};

use super::{LoginHistoryStore, LoginStats, PgStore, RepositoryError};

#[derive(Debug, FromRow)]
struct LoginRow {
    id: LoginRecordId,
    email: Email,
    name: String,
    ip_address: String,
    user_agent: String,
    session_key: String,
    browser: String,
    os: String,
    device: String,
    login_time: DateTime<Utc>,
    logout_time: Option<DateTime<Utc>>,
}

impl From<LoginRow> for LoginRecord {
    fn from(row: LoginRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            session_key: row.session_key,
            device: DeviceInfo {
                browser: row.browser,
                os: row.os,
                device: row.device,
            },
            login_time: row.login_time,
            logout_time: row.logout_time,
        }
    }
}

const LOGIN_COLUMNS: &str = "id, email, name, ip_address, user_agent, session_key, \
                             browser, os, device, login_time, logout_time";

impl LoginHistoryStore for PgStore {
    async fn record_login(&self, new: &NewLoginRecord) -> Result<LoginRecord, RepositoryError> {
        let row = sqlx::query_as::<_, LoginRow>(&format!(
            r"
            INSERT INTO storefront.login_history
                (email, name, ip_address, user_agent, session_key, browser, os, device)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LOGIN_COLUMNS}
            "
        ))
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.ip_address)
        .bind(&new.user_agent)
        .bind(&new.session_key)
        .bind(&new.device.browser)
        .bind(&new.device.os)
        .bind(&new.device.device)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn record_logout(
        &self,
        email: &Email,
        session_key: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<LoginRecordId>, RepositoryError> {
        let id: Option<LoginRecordId> = sqlx::query_scalar(
            r"
            UPDATE storefront.login_history
            SET logout_time = $3
            WHERE id = (
                SELECT id FROM storefront.login_history
                WHERE email = $1 AND session_key = $2 AND logout_time IS NULL
                ORDER BY login_time DESC
                LIMIT 1
            )
            RETURNING id
            ",
        )
        .bind(email)
        .bind(session_key)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn recent_logins(&self, limit: i64) -> Result<Vec<LoginRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, LoginRow>(&format!(
            "SELECT {LOGIN_COLUMNS} FROM storefront.login_history ORDER BY login_time DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LoginRecord::from).collect())
    }

    async fn login_stats(&self, since: DateTime<Utc>) -> Result<LoginStats, RepositoryError> {
        let (total, since, active): (i64, i64, i64) = sqlx::query_as(
            r"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE login_time >= $1),
                COUNT(*) FILTER (WHERE logout_time IS NULL)
            FROM storefront.login_history
            ",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(LoginStats {
            total,
            since,
            active,
        })
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.login_history WHERE login_time < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
