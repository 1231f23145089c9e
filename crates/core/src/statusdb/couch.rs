//! CouchDB status database client.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

use super::{StatusDb, StatusDbError};
use crate::config::StatusDbConfig;
use crate::run::RunRecord;

/// Hex SHA-256 of the serialized record.
pub fn content_hash(record: &RunRecord) -> Result<String, StatusDbError> {
    let bytes = serde_json::to_vec(record)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

#[derive(Serialize)]
struct RunDocument<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    rev: Option<&'a str>,
    content_hash: &'a str,
    #[serde(flatten)]
    record: &'a RunRecord,
}

#[derive(Deserialize)]
struct StoredDocument {
    #[serde(rename = "_rev")]
    rev: String,
    #[serde(default)]
    content_hash: Option<String>,
}

/// Run documents keyed by run id in one CouchDB database.
pub struct CouchStatusDb {
    client: Client,
    base_url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl CouchStatusDb {
    pub fn new(config: &StatusDbConfig) -> Result<Self, StatusDbError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn doc_url(&self, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(&self.database),
            urlencoding::encode(id)
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    fn fetch(&self, id: &str) -> Result<Option<StoredDocument>, StatusDbError> {
        let response = self.request(Method::GET, &self.doc_url(id)).send()?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<StoredDocument>()?)),
            status => Err(StatusDbError::Http {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            }),
        }
    }
}

impl StatusDb for CouchStatusDb {
    fn upload_run_record(&self, record: &RunRecord) -> Result<bool, StatusDbError> {
        let id = record.run_id.id.as_str();
        let hash = content_hash(record)?;
        let stored = self.fetch(id)?;

        if let Some(doc) = &stored {
            if doc.content_hash.as_deref() == Some(hash.as_str()) {
                debug!("Status database document for {} is up to date", id);
                return Ok(false);
            }
        }

        let document = RunDocument {
            id,
            rev: stored.as_ref().map(|doc| doc.rev.as_str()),
            content_hash: &hash,
            record,
        };
        let response = self
            .request(Method::PUT, &self.doc_url(id))
            .json(&document)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatusDbError::Http {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        info!("Uploaded run {} to status database {}", id, self.database);
        Ok(true)
    }
}
