//! REST client for the hosted document store (Firestore API), including the
//! codec between plain JSON and the store's typed value representation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use tracing::debug;

use super::traits::{DocumentStore, StoreError};

/// Firestore REST client scoped to one project's default database.
pub struct RestDocuments {
    client: Client,
    documents_url: String,
    api_key: String,
}

impl RestDocuments {
    /// Create a client against the given endpoint, e.g.
    /// `https://firestore.googleapis.com/v1`.
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        project_id: &str,
        api_key: impl Into<String>,
    ) -> Self {
        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            base_url.into(),
            project_id
        );
        Self {
            client,
            documents_url,
            api_key: api_key.into(),
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}?key={}", self.documents_url, collection, self.api_key)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}?key={}",
            self.documents_url, collection, id, self.api_key
        )
    }

    fn run_query_url(&self) -> String {
        format!("{}:runQuery?key={}", self.documents_url, self.api_key)
    }
}

fn provider_error(status: StatusCode, body: &str) -> StoreError {
    super::traits::map_provider_error(status, body, StoreError::Provider, |status, body| {
        StoreError::RequestFailed {
            status: status.as_u16(),
            body,
        }
    })
}

/// A document as the store returns it: a full resource name plus typed fields.
#[derive(Deserialize)]
struct StoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl StoreDocument {
    /// The id is the last segment of the resource name.
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    fn into_pair(self) -> (String, Map<String, Value>) {
        let id = self.id().to_string();
        (id, decode_fields(&self.fields))
    }
}

#[derive(Deserialize, Default)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<StoreDocument>,
}

#[derive(Deserialize)]
struct QueryResult {
    document: Option<StoreDocument>,
}

/// Encode a plain JSON map into the store's typed `fields` representation.
pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode the store's typed `fields` representation back into plain JSON.
pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

/// Encode one JSON value into its typed wrapper.
///
/// Integers travel as strings per the store's wire format; doubles as
/// numbers. Arrays and objects nest recursively.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = encode_fields(map);
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Decode one typed wrapper back into a plain JSON value. Unknown wrapper
/// kinds decode to null rather than failing the whole document.
pub fn decode_value(wrapped: &Value) -> Value {
    let Some(map) = wrapped.as_object() else {
        return Value::Null;
    };

    if map.contains_key("nullValue") {
        return Value::Null;
    }
    if let Some(b) = map.get("booleanValue").and_then(Value::as_bool) {
        return Value::Bool(b);
    }
    if let Some(v) = map.get("integerValue") {
        let parsed = match v {
            Value::String(s) => s.parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        if let Some(i) = parsed {
            return Value::Number(Number::from(i));
        }
        return Value::Null;
    }
    if let Some(v) = map.get("doubleValue") {
        if let Some(f) = v.as_f64() {
            return Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
        }
        return Value::Null;
    }
    for key in ["stringValue", "timestampValue", "referenceValue"] {
        if let Some(s) = map.get(key).and_then(Value::as_str) {
            return Value::String(s.to_string());
        }
    }
    if let Some(values) = map
        .get("arrayValue")
        .and_then(|a| a.get("values"))
        .and_then(Value::as_array)
    {
        return Value::Array(values.iter().map(decode_value).collect());
    }
    if let Some(fields) = map
        .get("mapValue")
        .and_then(|m| m.get("fields"))
        .and_then(Value::as_object)
    {
        return Value::Object(decode_fields(fields));
    }

    Value::Null
}

#[async_trait]
impl DocumentStore for RestDocuments {
    async fn insert(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, StoreError> {
        let body = json!({ "fields": encode_fields(fields) });
        let response = self
            .client
            .post(self.collection_url(collection))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &body));
        }

        let created: StoreDocument = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        let id = created.id().to_string();
        debug!(collection, id = %id, "document created");
        Ok(id)
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, StoreError> {
        let response = self
            .client
            .get(self.document_url(collection, id))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &body));
        }

        let document: StoreDocument = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(Some(document.into_pair().1))
    }

    async fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Map<String, Value>)>, StoreError> {
        let response = self
            .client
            .get(self.collection_url(collection))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &body));
        }

        let listed: ListResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        debug!(collection, count = listed.documents.len(), "collection scanned");
        Ok(listed
            .documents
            .into_iter()
            .map(StoreDocument::into_pair)
            .collect())
    }

    async fn find_first(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Map<String, Value>>, StoreError> {
        let body = json!({
            "structuredQuery": {
                "from": [ { "collectionId": collection } ],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": encode_value(value)
                    }
                },
                "limit": 1
            }
        });

        let response = self
            .client
            .post(self.run_query_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &body));
        }

        // runQuery returns a result array; an empty match carries entries
        // without a document.
        let results: Vec<QueryResult> = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(results
            .into_iter()
            .find_map(|r| r.document)
            .map(|d| d.into_pair().1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_round_trip() {
        for value in [
            json!(null),
            json!(true),
            json!(42),
            json!(-7),
            json!(2.5),
            json!("hello"),
        ] {
            assert_eq!(decode_value(&encode_value(&value)), value);
        }
    }

    #[test]
    fn test_integers_travel_as_strings() {
        let encoded = encode_value(&json!(108));
        assert_eq!(encoded, json!({ "integerValue": "108" }));
        assert_eq!(decode_value(&encoded), json!(108));
    }

    #[test]
    fn test_nested_structures_round_trip() {
        let value = json!({
            "title": "Berserk",
            "tags": ["seinen", "fantasy"],
            "meta": { "volumes": 41, "ongoing": false }
        });
        let map = value.as_object().unwrap();
        let decoded = decode_fields(&encode_fields(map));
        assert_eq!(Value::Object(decoded), value);
    }

    #[test]
    fn test_timestamp_decodes_as_string() {
        let wrapped = json!({ "timestampValue": "2024-01-01T00:00:00Z" });
        assert_eq!(decode_value(&wrapped), json!("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_unknown_wrapper_decodes_to_null() {
        let wrapped = json!({ "geoPointValue": { "latitude": 0, "longitude": 0 } });
        assert_eq!(decode_value(&wrapped), Value::Null);
    }

    #[test]
    fn test_document_id_is_last_name_segment() {
        let document = StoreDocument {
            name: "projects/p/databases/(default)/documents/manga/abc123".to_string(),
            fields: Map::new(),
        };
        assert_eq!(document.id(), "abc123");
    }
}
