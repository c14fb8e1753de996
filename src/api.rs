//! Framework-agnostic request surface over the store.
//!
//! Each operation returns an [`ApiResponse`] carrying an HTTP-style status
//! code and a JSON body. Wiring these to an actual HTTP framework is left to
//! the consumer.

use crate::error::StoreError;
use crate::store::SeriesStore;
use log::{debug, error};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Response returned by every [`SeriesApi`] operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Response body (records, message or error detail).
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    /// Build a 400 response with a plain error message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            body: json!({ "error": message.into() }),
        }
    }

    /// Build an error response from a `StoreError`.
    pub fn from_error(err: StoreError) -> Self {
        let status = match &err {
            StoreError::InvalidField { .. }
            | StoreError::MissingField { .. }
            | StoreError::InvalidValue { .. }
            | StoreError::Json(_) => 400,
            StoreError::NotFound { .. } => 404,
            _ => 500,
        };

        if err.is_client_error() {
            debug!("Rejected request: {}", err);
        } else {
            error!("{}", err);
        }

        let body = match &err {
            StoreError::InvalidField { fields } | StoreError::MissingField { fields } => {
                json!({ "error": err.to_string(), "fields": fields })
            }
            StoreError::NotFound { .. } => json!({ "error": "Serie not found" }),
            _ => json!({ "error": err.to_string() }),
        };

        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

impl From<StoreError> for ApiResponse {
    fn from(err: StoreError) -> Self {
        Self::from_error(err)
    }
}

/// Controller layer mapping series requests onto a shared store.
#[derive(Debug, Clone)]
pub struct SeriesApi {
    store: Arc<SeriesStore>,
}

impl SeriesApi {
    pub fn new(store: Arc<SeriesStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    /// `GET /series/{limit}`. Negative limits yield an empty list.
    pub fn list(&self, limit: i64) -> ApiResponse {
        let limit = usize::try_from(limit).unwrap_or(0);
        self.respond(|store| Ok(ApiResponse::ok(json!(store.list(limit)?))))
    }

    /// `GET /series/{id}`.
    pub fn get(&self, id: u64) -> ApiResponse {
        self.respond(|store| match store.get_by_id(id)? {
            Some(serie) => Ok(ApiResponse::ok(json!(serie))),
            None => Err(StoreError::NotFound { id }),
        })
    }

    /// `POST /filter`. An empty or non-object body is rejected before the
    /// store is consulted; an empty match set is a 200 with a message.
    pub fn filter(&self, body: &Value) -> ApiResponse {
        let criteria = match body.as_object() {
            Some(criteria) if !criteria.is_empty() => criteria,
            _ => return ApiResponse::bad_request("No filter criteria supplied"),
        };

        self.respond(|store| {
            let matched = store.filter(criteria)?;
            if matched.is_empty() {
                Ok(ApiResponse::ok(
                    json!({ "message": "No series found for the given filters" }),
                ))
            } else {
                Ok(ApiResponse::ok(json!(matched)))
            }
        })
    }

    /// `POST /series`.
    pub fn create(&self, body: &Value) -> ApiResponse {
        let Some(fields) = body.as_object() else {
            return ApiResponse::bad_request("Request body must be a JSON object");
        };
        self.respond(|store| Ok(ApiResponse::created(json!(store.insert(fields)?))))
    }

    /// `PUT /series/{id}`.
    pub fn update(&self, id: u64, body: &Value) -> ApiResponse {
        let Some(fields) = body.as_object() else {
            return ApiResponse::bad_request("Request body must be a JSON object");
        };
        self.respond(|store| Ok(ApiResponse::ok(json!(store.update(id, fields)?))))
    }

    /// `DELETE /series/{id}`.
    pub fn delete(&self, id: u64) -> ApiResponse {
        self.respond(|store| {
            store.delete(id)?;
            Ok(ApiResponse::ok(
                json!({ "message": "Serie deleted", "id": id }),
            ))
        })
    }

    fn respond<F>(&self, handler: F) -> ApiResponse
    where
        F: FnOnce(&SeriesStore) -> Result<ApiResponse, StoreError>,
    {
        handler(self.store.as_ref()).unwrap_or_else(ApiResponse::from_error)
    }
}
