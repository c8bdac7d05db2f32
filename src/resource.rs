//! Content collection operations
//!
//! Thin CRUD wrappers over the HTTP client core. Session handling is entirely
//! the client's concern; nothing here knows about tokens.

use serde_json::{Map, Value};
use tracing::{debug, info};
use validator::Validate;

use sitedesk_protocol::{validate_new_record, ContentKind, Envelope, ListQuery, Page};

use crate::client::{ApiRequest, FormPart, HttpClient};
use crate::error::{DeskError, Result};

/// Record fields that hold stored media paths
const MEDIA_FIELDS: &[&str] = &[
    "image", "images", "logo", "photo", "avatar", "cover", "icon", "url", "thumbnail",
];

#[derive(Debug, Clone)]
pub struct ContentService {
    client: HttpClient,
}

impl ContentService {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, kind: ContentKind, query: &ListQuery) -> Result<Page<Value>> {
        query
            .validate()
            .map_err(|e| DeskError::validation(format!("Invalid list query: {}", e)))?;

        let envelope = self
            .client
            .send_envelope(ApiRequest::get(kind.path()).query(query.to_pairs()))
            .await?;

        let total = envelope.total();
        let items = collection(kind, envelope)?;
        debug!(kind = %kind, count = items.len(), "Listed records");

        Ok(Page {
            total: total.unwrap_or(items.len() as u64),
            page: query.page.unwrap_or(1),
            items,
        })
    }

    pub async fn get(&self, kind: ContentKind, id: &str) -> Result<Value> {
        let envelope = self
            .client
            .send_envelope(ApiRequest::get(record_path(kind, id)?))
            .await?;
        record(kind, envelope)
    }

    /// Create a record; `files` switches the body to multipart.
    pub async fn create(
        &self,
        kind: ContentKind,
        fields: Value,
        files: Vec<FormPart>,
    ) -> Result<Value> {
        validate_new_record(kind, &fields).map_err(|reason| {
            DeskError::validation(format!("Invalid {} record: {}", kind, reason))
        })?;

        let request = with_body(ApiRequest::post(kind.path()), kind, fields, files)?;
        let created = record(kind, self.client.send_envelope(request).await?)?;
        info!(kind = %kind, "Record created");
        Ok(created)
    }

    /// Partially update a record
    pub async fn update(
        &self,
        kind: ContentKind,
        id: &str,
        fields: Value,
        files: Vec<FormPart>,
    ) -> Result<Value> {
        let request = with_body(ApiRequest::patch(record_path(kind, id)?), kind, fields, files)?;
        let updated = record(kind, self.client.send_envelope(request).await?)?;
        info!(kind = %kind, id, "Record updated");
        Ok(updated)
    }

    pub async fn delete(&self, kind: ContentKind, id: &str) -> Result<()> {
        self.client
            .send_envelope(ApiRequest::delete(record_path(kind, id)?))
            .await?;
        info!(kind = %kind, id, "Record deleted");
        Ok(())
    }

    /// Rewrite stored media paths in `record` to URLs the backend serves.
    /// Values outside the media prefix (external links) are left alone.
    pub fn resolve_media(&self, record: &mut Value) {
        let config = self.client.config();
        let Some(object) = record.as_object_mut() else {
            return;
        };
        let rewrite = |value: &mut Value| {
            if let Value::String(path) = value {
                if config.is_asset_path(path) {
                    *path = config.asset_url(path);
                }
            }
        };
        for field in MEDIA_FIELDS {
            match object.get_mut(*field) {
                Some(Value::Array(paths)) => paths.iter_mut().for_each(rewrite),
                Some(value) => rewrite(value),
                None => {}
            }
        }
    }
}

fn record_path(kind: ContentKind, id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() || id.contains('/') || id.contains('?') {
        return Err(DeskError::invalid_input(format!("Invalid record id '{}'", id)));
    }
    Ok(format!("{}/{}", kind.path(), id))
}

fn with_body(
    request: ApiRequest,
    kind: ContentKind,
    fields: Value,
    files: Vec<FormPart>,
) -> Result<ApiRequest> {
    if files.is_empty() {
        return Ok(request.json(fields));
    }
    if !kind.has_media() {
        return Err(DeskError::invalid_input(format!(
            "{} records do not accept file uploads",
            kind
        )));
    }

    let mut parts = text_parts(fields)?;
    parts.extend(files);
    Ok(request.multipart(parts))
}

/// JSON fields as multipart text parts; nested values are sent as JSON text.
fn text_parts(fields: Value) -> Result<Vec<FormPart>> {
    let object: Map<String, Value> = match fields {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        _ => return Err(DeskError::invalid_input("Record fields must be a JSON object")),
    };

    Ok(object
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| match value {
            Value::String(text) => FormPart::text(name, text),
            other => FormPart::text(name, other.to_string()),
        })
        .collect())
}

fn collection(kind: ContentKind, envelope: Envelope) -> Result<Vec<Value>> {
    let key = kind.plural_key();
    let payload = envelope
        .into_payload(key)
        .ok_or_else(|| DeskError::invalid_response(format!("No {} in response", key)))?;

    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(DeskError::invalid_response(format!(
                "Expected a list of {} in response",
                key
            ))),
        },
        _ => Err(DeskError::invalid_response(format!(
            "Expected a list of {} in response",
            key
        ))),
    }
}

fn record(kind: ContentKind, envelope: Envelope) -> Result<Value> {
    envelope
        .into_payload(kind.plural_key())
        .ok_or_else(|| DeskError::invalid_response(format!("No {} record in response", kind)))
}
