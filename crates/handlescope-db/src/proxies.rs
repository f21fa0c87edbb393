//! Proxy operations.
//!
//! Proxies are read-only from the pipeline's perspective; selection is random
//! among active rows, delegated to the database.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// An egress proxy for outbound rendering requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    /// Unique identifier
    pub id: String,
    /// Proxy protocol (e.g. `http`)
    pub protocol: String,
    /// Proxy host
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Optional username credential
    pub username: Option<String>,
    /// Optional password credential
    pub password: Option<String>,
    /// Whether the proxy participates in selection
    pub active: bool,
}

/// Create a proxy.
///
/// # Errors
/// Returns an error if the insert fails (e.g. duplicate protocol/host/port).
pub async fn create_proxy(
    pool: &Pool<Sqlite>,
    protocol: &str,
    host: &str,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    active: bool,
) -> Result<Proxy> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO proxies (id, protocol, host, port, username, password, active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(protocol)
    .bind(host)
    .bind(i64::from(port))
    .bind(&username)
    .bind(&password)
    .bind(active)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(Proxy {
        id,
        protocol: protocol.to_string(),
        host: host.to_string(),
        port,
        username,
        password,
        active,
    })
}

/// Select one active proxy uniformly at random.
///
/// Returns `None` when no active proxy exists; that is not an error.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn random_active(pool: &Pool<Sqlite>) -> Result<Option<Proxy>> {
    let row = sqlx::query(
        "SELECT id, protocol, host, port, username, password, active
         FROM proxies WHERE active = 1 ORDER BY RANDOM() LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let port: i64 = row.try_get("port")?;
            let active: i64 = row.try_get("active")?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Ok(Some(Proxy {
                id: row.try_get("id")?,
                protocol: row.try_get("protocol")?,
                host: row.try_get("host")?,
                port: port as u16,
                username: row.try_get("username")?,
                password: row.try_get("password")?,
                active: active != 0,
            }))
        }
        None => Ok(None),
    }
}
