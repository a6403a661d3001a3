// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-over-HTTP remote.
//!
//! Resource layout under the base URL:
//! - `GET    /{resource}`            list
//! - `GET    /{resource}?field=v`    filter
//! - `GET    /{resource}/{id}`       get
//! - `POST   /{resource}`            create
//! - `PATCH  /{resource}/{id}`       update
//! - `DELETE /{resource}/{id}`       delete
//!
//! Bodies may be bare or wrapped in a `{"data": ...}` envelope.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;

use super::{RemoteApi, RemoteError, RemoteFuture, RemoteResult};
use crate::error::{Error, Result};
use crate::record::{Predicate, Record};

/// Shared HTTP client for every resource of one backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(HttpBackend { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Remote for one resource (collection path segment).
    pub fn resource(&self, name: &str) -> HttpRemote {
        let mut collection = self.base.clone();
        if let Ok(mut segments) = collection.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        HttpRemote {
            client: self.client.clone(),
            collection,
        }
    }

    /// Reachability check: any HTTP answer counts as online.
    pub async fn probe(&self) -> bool {
        match self.client.get(self.base.clone()).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("probe of {} failed: {}", self.base, e);
                false
            }
        }
    }
}

/// [`RemoteApi`] for one REST collection.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    collection: Url,
}

impl HttpRemote {
    pub fn collection_url(&self) -> &Url {
        &self.collection
    }

    fn item_url(&self, id: &str) -> RemoteResult<Url> {
        let mut url = self.collection.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Network(format!("invalid resource url {}", self.collection)))?
            .push(id);
        Ok(url)
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    RemoteError::Network(err.to_string())
}

/// Check the status and decode the body, if any.
async fn read_json(response: Response) -> RemoteResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body
        };
        return Err(RemoteError::from_status(status.as_u16(), message));
    }
    if status == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    // The request was processed; a broken body is not a network failure.
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode_record(value: Value) -> RemoteResult<Record> {
    Record::from_value(unwrap_envelope(value))
        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

fn decode_records(value: Value) -> RemoteResult<Vec<Record>> {
    match unwrap_envelope(value) {
        Value::Array(items) => items.into_iter().map(decode_record).collect(),
        other => Err(RemoteError::InvalidResponse(format!(
            "expected a JSON array, got {other}"
        ))),
    }
}

/// Query parameters for the non-null clauses. A `null` clause means "field
/// absent or null", which a query string cannot say; it is applied to the
/// response instead.
fn query_pairs(predicate: &Predicate) -> Vec<(String, String)> {
    predicate
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(field, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (field.clone(), value)
        })
        .collect()
}

impl RemoteApi for HttpRemote {
    fn list(&self) -> RemoteFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.collection.clone())
                .send()
                .await
                .map_err(transport_error)?;
            decode_records(read_json(response).await?)
        })
    }

    fn get(&self, id: &str) -> RemoteFuture<'_, Record> {
        let url = self.item_url(id);
        Box::pin(async move {
            let response = self
                .client
                .get(url?)
                .send()
                .await
                .map_err(transport_error)?;
            decode_record(read_json(response).await?)
        })
    }

    fn filter(&self, predicate: &Predicate) -> RemoteFuture<'_, Vec<Record>> {
        let pairs = query_pairs(predicate);
        let absent: Predicate = predicate
            .iter()
            .filter(|(_, value)| value.is_null())
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        Box::pin(async move {
            let response = self
                .client
                .get(self.collection.clone())
                .query(&pairs)
                .send()
                .await
                .map_err(transport_error)?;
            let records = decode_records(read_json(response).await?)?;
            Ok(records.into_iter().filter(|r| r.matches(&absent)).collect())
        })
    }

    fn create(&self, payload: &Record) -> RemoteFuture<'_, Record> {
        let payload = payload.clone();
        Box::pin(async move {
            let response = self
                .client
                .post(self.collection.clone())
                .json(&payload)
                .send()
                .await
                .map_err(transport_error)?;
            decode_record(read_json(response).await?)
        })
    }

    fn update(&self, id: &str, patch: &Record) -> RemoteFuture<'_, Record> {
        let url = self.item_url(id);
        let patch = patch.clone();
        Box::pin(async move {
            let response = self
                .client
                .patch(url?)
                .json(&patch)
                .send()
                .await
                .map_err(transport_error)?;
            decode_record(read_json(response).await?)
        })
    }

    fn delete(&self, id: &str) -> RemoteFuture<'_, ()> {
        let url = self.item_url(id);
        Box::pin(async move {
            let response = self
                .client
                .delete(url?)
                .send()
                .await
                .map_err(transport_error)?;
            read_json(response).await.map(|_| ())
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
