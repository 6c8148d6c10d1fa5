use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Item, ItemRequest, ItemResponse, Resource, CREATED_AT, UPDATED_AT};
use crate::errors::ItemError;
use crate::storage::KvStore;

/// Stateless handler for the items resource.
///
/// Holds only the injected store and the primary-key field name; safe to share
/// across any number of concurrent requests.
#[derive(Clone)]
pub struct ItemHandler {
    store: Arc<dyn KvStore>,
    primary_key: String,
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.123Z`.
fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `from_slice` rejects bodies that are not valid UTF-8.
fn parse_body(body: Option<&[u8]>) -> Result<Item, ItemError> {
    let raw = body
        .filter(|b| !b.iter().all(u8::is_ascii_whitespace))
        .ok_or_else(|| ItemError::validation("Missing request body"))?;
    match serde_json::from_slice::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(ItemError::validation("Request body must be a JSON object")),
    }
}

impl ItemHandler {
    pub fn new(store: Arc<dyn KvStore>, primary_key: impl Into<String>) -> Self {
        Self { store, primary_key: primary_key.into() }
    }

    pub fn primary_key(&self) -> &str { &self.primary_key }

    pub fn table_name(&self) -> &str { self.store.table_name() }

    /// Single request boundary: every error is classified here and turned
    /// into a status plus `{"error": ...}` body.
    pub async fn handle(&self, req: ItemRequest) -> ItemResponse {
        debug!(
            table = self.table_name(),
            method = %req.method,
            resource = ?req.resource,
            id = ?req.id,
            "item request"
        );
        let method = req.method.clone();
        match self.dispatch(req).await {
            Ok(body) => ItemResponse::ok(body),
            Err(err) => {
                let status = err.status();
                match &err {
                    ItemError::ListFailed(cause) => {
                        error!(%method, status = status.as_u16(), %cause, "listing items failed")
                    }
                    _ if status.is_server_error() => {
                        error!(%method, status = status.as_u16(), error = %err, "item request failed")
                    }
                    _ => warn!(%method, status = status.as_u16(), error = %err, "item request rejected"),
                }
                ItemResponse::from_error(&err)
            }
        }
    }

    async fn dispatch(&self, req: ItemRequest) -> Result<Value, ItemError> {
        let id = req.identifier();
        match req.method.as_str() {
            "GET" => match (id, req.resource) {
                (Some(id), _) => self.get_item(id).await.map(Value::Object),
                (None, Resource::Collection) => self.list_items().await.map(into_array),
                (None, Resource::Item) => Err(ItemError::MissingIdentifier),
            },
            "POST" => {
                let item = parse_body(req.body.as_deref())?;
                self.create_item(item).await.map(Value::Object)
            }
            "PUT" => {
                let id = id.ok_or(ItemError::MissingIdentifier)?;
                let item = parse_body(req.body.as_deref())?;
                self.update_item(id, item).await.map(Value::Object)
            }
            "DELETE" => {
                let id = id.ok_or(ItemError::MissingIdentifier)?;
                self.delete_item(id).await.map(Value::Object)
            }
            other => Err(ItemError::UnsupportedMethod(other.to_string())),
        }
    }

    pub async fn list_items(&self) -> Result<Vec<Item>, ItemError> {
        self.store
            .scan()
            .await
            .map_err(|e| ItemError::ListFailed(e.to_string()))
    }

    pub async fn get_item(&self, id: &str) -> Result<Item, ItemError> {
        self.store
            .get(id)
            .await
            .map_err(ItemError::on_existing)?
            .ok_or(ItemError::NotFound)
    }

    /// Create-only write. A missing, null or empty key gets a fresh UUID.
    /// A collision is reported as `AlreadyExists`; generation is not retried.
    pub async fn create_item(&self, mut item: Item) -> Result<Item, ItemError> {
        let key = match item.get(&self.primary_key) {
            None | Some(Value::Null) => Uuid::new_v4().to_string(),
            Some(Value::String(s)) if s.is_empty() => Uuid::new_v4().to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ItemError::validation(format!(
                    "Field \"{}\" must be a string",
                    self.primary_key
                )))
            }
        };
        item.insert(self.primary_key.clone(), Value::String(key.clone()));
        item.remove(UPDATED_AT);
        item.insert(CREATED_AT.to_string(), Value::String(now_iso()));

        self.store
            .put_if_absent(&key, item.clone())
            .await
            .map_err(ItemError::on_create)?;
        info!(table = self.table_name(), %key, "item created");
        Ok(item)
    }

    /// Update-only write; the path `id` wins over any key in the body and the
    /// stored `createdAt` is kept.
    pub async fn update_item(&self, id: &str, mut item: Item) -> Result<Item, ItemError> {
        item.insert(self.primary_key.clone(), Value::String(id.to_string()));
        item.remove(CREATED_AT);
        item.insert(UPDATED_AT.to_string(), Value::String(now_iso()));

        let stored = self
            .store
            .put_if_present(id, item, &[CREATED_AT])
            .await
            .map_err(ItemError::on_existing)?;
        info!(table = self.table_name(), key = %id, "item updated");
        Ok(stored)
    }

    /// Existence-required delete, returning the prior field values.
    pub async fn delete_item(&self, id: &str) -> Result<Item, ItemError> {
        let prior = self
            .store
            .delete_if_present(id)
            .await
            .map_err(ItemError::on_existing)?;
        info!(table = self.table_name(), key = %id, "item deleted");
        Ok(prior)
    }
}

fn into_array(items: Vec<Item>) -> Value {
    Value::Array(items.into_iter().map(Value::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use axum::http::{header, StatusCode};
    use serde_json::json;
    use std::collections::HashSet;

    fn handler() -> (ItemHandler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("items"));
        (ItemHandler::new(store.clone(), "id"), store)
    }

    fn body(v: Value) -> Option<String> {
        Some(v.to_string())
    }

    async fn create(h: &ItemHandler, v: Value) -> ItemResponse {
        h.handle(ItemRequest::collection("POST", body(v))).await
    }

    /// Store whose backend is always down.
    struct DownStore;

    #[async_trait]
    impl KvStore for DownStore {
        fn table_name(&self) -> &str { "items" }
        async fn get(&self, _: &str) -> Result<Option<Item>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn scan(&self) -> Result<Vec<Item>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn put_if_absent(&self, _: &str, _: Item) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn put_if_present(&self, _: &str, _: Item, _: &[&str]) -> Result<Item, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete_if_present(&self, _: &str) -> Result<Item, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn create_generates_unique_keys() {
        let (h, store) = handler();
        let mut keys = HashSet::new();
        for i in 0..50 {
            let res = create(&h, json!({"name": format!("n{i}")})).await;
            assert_eq!(res.status, StatusCode::OK);
            let key = res.body["id"].as_str().unwrap_or_default().to_string();
            assert!(!key.is_empty());
            keys.insert(key);
        }
        assert_eq!(keys.len(), 50);
        assert_eq!(store.len(), 50);
    }

    #[tokio::test]
    async fn empty_or_null_key_is_replaced() {
        let (h, _) = handler();
        for v in [json!({"id": ""}), json!({"id": null})] {
            let res = create(&h, v).await;
            assert_eq!(res.status, StatusCode::OK);
            assert!(!res.body["id"].as_str().unwrap_or_default().is_empty());
        }
    }

    #[tokio::test]
    async fn create_is_write_once() {
        let (h, store) = handler();
        let first = create(&h, json!({"id": "fixed", "name": "original"})).await;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.body["id"], "fixed");

        let second = create(&h, json!({"id": "fixed", "name": "clobber"})).await;
        assert_eq!(second.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(second.body, json!({"error": "Item already exists"}));

        let stored = store.get("fixed").await.unwrap().unwrap();
        assert_eq!(stored["name"], "original");
    }

    #[tokio::test]
    async fn update_requires_existence() {
        let (h, store) = handler();
        let res = h.handle(ItemRequest::item("PUT", "ghost", body(json!({"name": "x"})))).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body, json!({"error": "Item not found"}));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_path_wins() {
        let (h, store) = handler();
        create(&h, json!({"id": "a", "v": 1})).await;
        let res = h.handle(ItemRequest::item("PUT", "a", body(json!({"id": "b", "v": 2})))).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["id"], "a");
        assert_eq!(store.get("a").await.unwrap().unwrap()["v"], 2);
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_requires_existence() {
        let (h, store) = handler();
        let res = h.handle(ItemRequest::item("DELETE", "nope", None)).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);

        create(&h, json!({"id": "k", "name": "last"})).await;
        let res = h.handle(ItemRequest::item("DELETE", "k", None)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["name"], "last");

        let res = h.handle(ItemRequest::item("GET", "k", None)).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        let listed = h.handle(ItemRequest::collection("GET", None)).await;
        assert_eq!(listed.body, json!([]));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn timestamp_discipline() {
        let (h, _) = handler();
        let created = create(&h, json!({"name": "x", "updatedAt": "forged"})).await;
        let id = created.body["id"].as_str().unwrap_or_default().to_string();
        let created_at = created.body[CREATED_AT].as_str().unwrap_or_default().to_string();
        assert!(chrono::DateTime::parse_from_rfc3339(&created_at).is_ok());
        assert!(created_at.ends_with('Z'));
        assert!(created.body.get(UPDATED_AT).is_none());

        let updated = h
            .handle(ItemRequest::item("PUT", &id, body(json!({"name": "y", "createdAt": "forged"}))))
            .await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body[CREATED_AT], created_at.as_str());
        let updated_at = updated.body[UPDATED_AT].as_str().unwrap_or_default();
        assert!(chrono::DateTime::parse_from_rfc3339(updated_at).is_ok());

        let fetched = h.handle(ItemRequest::item("GET", &id, None)).await;
        assert_eq!(fetched.body, updated.body);
    }

    #[tokio::test]
    async fn end_to_end_scenario() {
        let (h, _) = handler();
        let created = create(&h, json!({"name": "x"})).await;
        assert_eq!(created.status, StatusCode::OK);
        let id = created.body["id"].as_str().unwrap_or_default().to_string();
        assert!(created.body.get(CREATED_AT).is_some());

        let got = h.handle(ItemRequest::item("GET", &id, None)).await;
        assert_eq!(got.status, StatusCode::OK);
        assert_eq!(got.body, created.body);

        let put = h.handle(ItemRequest::item("PUT", &id, body(json!({"name": "y"})))).await;
        assert_eq!(put.status, StatusCode::OK);
        assert_eq!(put.body["name"], "y");
        assert!(put.body.get(UPDATED_AT).is_some());

        let del = h.handle(ItemRequest::item("DELETE", &id, None)).await;
        assert_eq!(del.status, StatusCode::OK);
        assert_eq!(del.body["name"], "y");

        let gone = h.handle(ItemRequest::item("GET", &id, None)).await;
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_identifier_is_bad_request() {
        let (h, _) = handler();
        for req in [
            ItemRequest::collection("PUT", body(json!({"name": "x"}))),
            ItemRequest::collection("DELETE", None),
            ItemRequest::item("DELETE", "", None),
            ItemRequest::item("GET", "", None),
        ] {
            let res = h.handle(req).await;
            assert_eq!(res.status, StatusCode::BAD_REQUEST);
            assert_eq!(res.body, json!({"error": "Missing item ID"}));
        }
    }

    #[tokio::test]
    async fn unsupported_method() {
        let (h, _) = handler();
        let res = h.handle(ItemRequest::collection("PATCH", None)).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.body, json!({"error": "Unsupported method: \"PATCH\""}));
        assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn bad_bodies_are_rejected() {
        let (h, store) = handler();
        let cases = [
            None,
            Some("   ".to_string()),
            Some("{not json".to_string()),
            Some("[1,2]".to_string()),
            Some(r#"{"id": 42}"#.to_string()),
        ];
        for b in cases {
            let res = h.handle(ItemRequest::collection("POST", b)).await;
            assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(res.body["error"].is_string());
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn non_utf8_body_is_not_stored() {
        let (h, store) = handler();
        let mut raw = br#"{"id":"u","name":""#.to_vec();
        raw.push(0xff);
        raw.extend_from_slice(br#""}"#);

        let req = ItemRequest::collection("POST", None).with_raw_body(Some(raw));
        let res = h.handle(req).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        let msg = res.body["error"].as_str().unwrap_or_default();
        assert!(msg.starts_with("invalid JSON body"), "{msg}");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_failures_are_server_errors() {
        let h = ItemHandler::new(Arc::new(DownStore), "id");
        let res = h.handle(ItemRequest::collection("GET", None)).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body, json!({"error": "Failed to list items"}));

        let res = h.handle(ItemRequest::item("GET", "a", None)).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body, json!({"error": "store unavailable: connection refused"}));

        let res = h.handle(ItemRequest::item("DELETE", "a", None)).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn custom_primary_key_field() {
        let store = Arc::new(MemoryStore::new("things"));
        let h = ItemHandler::new(store.clone(), "itemId");
        assert_eq!(h.primary_key(), "itemId");
        assert_eq!(h.table_name(), "things");

        let res = create(&h, json!({"name": "x"})).await;
        let key = res.body["itemId"].as_str().unwrap_or_default().to_string();
        assert!(!key.is_empty());
        assert!(res.body.get("id").is_none());
        assert!(store.get(&key).await.unwrap().is_some());
    }
}
