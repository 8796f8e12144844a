//! Named cache stores over SQLite.
//!
//! `CacheStorage` is the seam the worker talks to. `CacheDb` implements it
//! with two tables: one row per store and one row per cached response.
//! Matching follows the browser Cache API: only `GET` requests match, the
//! URL fragment is ignored, and a stored `Vary` header must agree with the
//! incoming request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use url::Url;

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use crate::message::{Headers, Request, Response, ResponseType};

/// Named request→response stores managed on behalf of the worker.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Store names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Create the store if it does not exist yet.
    async fn open_store(&self, name: &str) -> Result<(), Error>;

    /// Drop a store and everything in it. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look up `request` in the named store. A missing store is a miss.
    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, Error>;

    /// Store `response` under `request`, creating the store lazily.
    /// Overwrites any previous entry for the same key.
    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<(), Error>;
}

/// Summary of one cached entry, without the body.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CachedEntry {
    pub url: String,
    pub status: u16,
    pub response_type: ResponseType,
    pub body_bytes: u64,
    pub stored_at: String,
}

/// Request header values selected by a response's `Vary` header.
type VaryValues = Vec<(String, Option<String>)>;

fn vary_names(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_combined("vary")
        .map(|v| {
            v.split(',')
                .map(|name| name.trim().to_ascii_lowercase())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn vary_values(names: &[String], request: &Request) -> VaryValues {
    names
        .iter()
        .map(|name| (name.clone(), request.headers().get_combined(name)))
        .collect()
}

struct StoredRow {
    vary_json: String,
    status: u16,
    status_text: String,
    response_type: String,
    response_url: Option<String>,
    redirected: bool,
    headers_json: String,
    body: Vec<u8>,
}

impl StoredRow {
    fn into_response(self) -> Result<Response, Error> {
        let headers: Headers = serde_json::from_str(&self.headers_json)?;
        let response_type: ResponseType = self.response_type.parse()?;

        let mut response = Response::new(self.status, self.body)
            .with_status_text(self.status_text)
            .with_type(response_type)
            .with_redirected(self.redirected)
            .with_headers(headers);

        if let Some(url) = self.response_url {
            let url = Url::parse(&url).map_err(|e| Error::CorruptEntry(format!("response url: {e}")))?;
            response = response.with_url(url);
        }

        Ok(response)
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn open_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }

        let name = name.to_string();
        let key = compute_request_key(request.method(), request.url());
        let row = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let row = conn
                    .query_row(
                        "SELECT vary_json, status, status_text, response_type, response_url,
                                redirected, headers_json, body
                         FROM cache_entries WHERE store = ?1 AND request_key = ?2",
                        params![name, key],
                        |row| {
                            Ok(StoredRow {
                                vary_json: row.get(0)?,
                                status: row.get(1)?,
                                status_text: row.get(2)?,
                                response_type: row.get(3)?,
                                response_url: row.get(4)?,
                                redirected: row.get::<_, i32>(5)? == 1,
                                headers_json: row.get(6)?,
                                body: row.get(7)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stored: VaryValues = serde_json::from_str(&row.vary_json)?;
        let names: Vec<String> = stored.iter().map(|(name, _)| name.clone()).collect();
        if stored != vary_values(&names, request) {
            tracing::debug!(url = %request.url(), "stored entry varies from request");
            return Ok(None);
        }

        row.into_response().map(Some)
    }

    async fn put(&self, name: &str, request: &Request, mut response: Response) -> Result<(), Error> {
        if !request.is_get() {
            return Err(Error::CacheRejected(format!("request method {} is not GET", request.method())));
        }
        if response.status() == 206 {
            return Err(Error::CacheRejected("partial responses cannot be stored".into()));
        }

        let names = vary_names(&response);
        if names.iter().any(|name| name == "*") {
            return Err(Error::CacheRejected("response varies on *".into()));
        }

        let vary_json = serde_json::to_string(&vary_values(&names, request))?;
        let headers_json = serde_json::to_string(response.headers())?;
        let body = response.bytes()?;

        let name = name.to_string();
        let key = compute_request_key(request.method(), request.url());
        let method = request.method().to_string();
        let mut url = request.url().clone();
        url.set_fragment(None);
        let url = url.to_string();
        let status = response.status();
        let status_text = response.status_text().to_string();
        let response_type = response.response_type().as_str();
        let response_url = response.url().map(|u| u.to_string());
        let redirected = response.redirected();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (
                        store, request_key, method, url, vary_json, status, status_text,
                        response_type, response_url, redirected, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    ON CONFLICT(store, request_key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        vary_json = excluded.vary_json,
                        status = excluded.status,
                        status_text = excluded.status_text,
                        response_type = excluded.response_type,
                        response_url = excluded.response_url,
                        redirected = excluded.redirected,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        name,
                        key,
                        method,
                        url,
                        vary_json,
                        status,
                        status_text,
                        response_type,
                        response_url,
                        redirected as i32,
                        headers_json,
                        body.to_vec(),
                        now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Number of entries in a store (0 for a missing store).
    pub async fn entry_count(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// List entries of a store, oldest first.
    pub async fn entries(&self, name: &str) -> Result<Vec<CachedEntry>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, response_type, LENGTH(body), stored_at
                     FROM cache_entries WHERE store = ?1 ORDER BY stored_at ASC, rowid ASC",
                )?;
                let rows = stmt
                    .query_map(params![name], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, u16>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;

                rows.into_iter()
                    .map(|(url, status, response_type, body_bytes, stored_at)| -> Result<CachedEntry, Error> {
                        Ok(CachedEntry {
                            url,
                            status,
                            response_type: response_type.parse()?,
                            body_bytes: body_bytes as u64,
                            stored_at,
                        })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }
}
