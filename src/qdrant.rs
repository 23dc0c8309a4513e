//! Qdrant-backed implementation of [`VectorIndex`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Payload;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance,
    FieldType, Filter, GetPointsBuilder, PointStruct, PointsIdsList, QueryPointsBuilder,
    UpsertPointsBuilder, Value, VectorParams, VectorParamsMap, VectorsConfig,
    point_id::PointIdOptions, points_selector::PointsSelectorOneOf, value::Kind,
    vectors_config,
};
use tracing::{debug, info};

use crate::config::QdrantConfig;
use crate::error::{MemoryError, Result};
use crate::index::{CollectionSpec, DeleteStatus, SearchHit, StoredPoint, VectorIndex};
use crate::types::{FieldIndexType, Metadata, Vector};

pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    /// Connect to a Qdrant server.
    pub fn connect(config: &QdrantConfig) -> Result<Self> {
        let mut builder =
            Qdrant::from_url(&config.url).timeout(Duration::from_secs(config.timeout_seconds));
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| MemoryError::Index(format!("Failed to connect to Qdrant: {e}")))?;

        info!(url = %config.url, "Connected to Qdrant");
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(|e| MemoryError::Index(format!("Collection existence check failed: {e}")))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| MemoryError::Index(format!("Failed to list collections: {e}")))?;
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn create_collection(&self, collection: &str, spec: &CollectionSpec) -> Result<()> {
        let params = VectorParams {
            size: spec.vector_size,
            distance: Distance::Cosine.into(),
            ..Default::default()
        };
        let vectors_config = if spec.vector_name.is_empty() {
            VectorsConfig {
                config: Some(vectors_config::Config::Params(params)),
            }
        } else {
            VectorsConfig {
                config: Some(vectors_config::Config::ParamsMap(VectorParamsMap {
                    map: HashMap::from([(spec.vector_name.clone(), params)]),
                })),
            }
        };

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection).vectors_config(vectors_config),
            )
            .await
            .map_err(|e| {
                MemoryError::Index(format!("Failed to create collection {collection}: {e}"))
            })?;

        for (field, field_type) in &spec.field_indexes {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    collection,
                    field,
                    map_field_type(*field_type),
                ))
                .await
                .map_err(|e| {
                    MemoryError::Index(format!("Failed to index field {field}: {e}"))
                })?;
        }

        info!(collection, vector_size = spec.vector_size, "Created collection");
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector_name: &str,
        vector: Vector,
        payload: Metadata,
    ) -> Result<()> {
        let payload = Payload::try_from(serde_json::Value::Object(payload))
            .map_err(|e| MemoryError::Index(format!("Invalid payload: {e}")))?;

        let point = if vector_name.is_empty() {
            PointStruct::new(id.to_string(), vector, payload)
        } else {
            let named: HashMap<String, Vec<f32>> =
                HashMap::from([(vector_name.to_string(), vector)]);
            PointStruct::new(id.to_string(), named, payload)
        };

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .map_err(|e| MemoryError::Index(format!("Upsert failed: {e}")))?;

        debug!(collection, id, "Upserted point");
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredPoint>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, vec![id.to_string().into()])
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| MemoryError::Index(format!("Get failed: {e}")))?;

        Ok(response.result.into_iter().next().map(|point| StoredPoint {
            id: point.id.map(point_id_to_string).unwrap_or_default(),
            payload: payload_to_json(point.payload),
        }))
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        vector_name: &str,
        limit: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<SearchHit>> {
        let mut builder = QueryPointsBuilder::new(collection)
            .query(vector.to_vec())
            .limit(limit as u64)
            .with_payload(true);
        if !vector_name.is_empty() {
            builder = builder.using(vector_name);
        }
        if let Some(filter) = filter {
            builder = builder.filter(filter);
        }

        let response = self
            .client
            .query(builder)
            .await
            .map_err(|e| MemoryError::Index(format!("Query failed: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| SearchHit {
                id: point.id.map(point_id_to_string).unwrap_or_default(),
                score: point.score,
                payload: payload_to_json(point.payload),
            })
            .collect())
    }

    async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<DeleteStatus> {
        let selector = PointsSelectorOneOf::Points(PointsIdsList {
            ids: ids.iter().map(|id| id.clone().into()).collect(),
        });
        self.delete_points(collection, selector).await
    }

    async fn delete_by_filter(&self, collection: &str, filter: Filter) -> Result<DeleteStatus> {
        self.delete_points(collection, PointsSelectorOneOf::Filter(filter))
            .await
    }
}

impl QdrantIndex {
    async fn delete_points(
        &self,
        collection: &str,
        selector: PointsSelectorOneOf,
    ) -> Result<DeleteStatus> {
        let builder = match selector {
            PointsSelectorOneOf::Points(ids) => {
                DeletePointsBuilder::new(collection).points(ids)
            }
            PointsSelectorOneOf::Filter(filter) => {
                DeletePointsBuilder::new(collection).points(filter)
            }
        };

        let response = self
            .client
            .delete_points(builder.wait(true))
            .await
            .map_err(|e| MemoryError::Index(format!("Delete failed: {e}")))?;

        let result = response.result.unwrap_or_default();
        Ok(DeleteStatus {
            status: update_status_name(result.status),
            operation_id: result.operation_id,
        })
    }
}

fn map_field_type(field_type: FieldIndexType) -> FieldType {
    match field_type {
        FieldIndexType::Keyword => FieldType::Keyword,
        FieldIndexType::Integer => FieldType::Integer,
        FieldIndexType::Float => FieldType::Float,
        FieldIndexType::Bool => FieldType::Bool,
    }
}

fn update_status_name(status: i32) -> String {
    match status {
        1 => "acknowledged".to_string(),
        2 => "completed".to_string(),
        3 => "clock_rejected".to_string(),
        _ => "unknown".to_string(),
    }
}

fn point_id_to_string(id: qdrant_client::qdrant::PointId) -> String {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn payload_to_json(payload: HashMap<String, Value>) -> Metadata {
    payload
        .into_iter()
        .map(|(k, v)| (k, value_to_json(v)))
        .collect()
}

fn value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
        Some(Kind::ListValue(l)) => {
            serde_json::Value::Array(l.values.into_iter().map(value_to_json).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_status_name() {
        assert_eq!(update_status_name(1), "acknowledged");
        assert_eq!(update_status_name(2), "completed");
        assert_eq!(update_status_name(3), "clock_rejected");
        assert_eq!(update_status_name(0), "unknown");
        assert_eq!(update_status_name(99), "unknown");
    }

    #[test]
    fn test_point_id_to_string() {
        let uuid_id = qdrant_client::qdrant::PointId {
            point_id_options: Some(PointIdOptions::Uuid("abc-123".to_string())),
        };
        assert_eq!(point_id_to_string(uuid_id), "abc-123");

        let num_id = qdrant_client::qdrant::PointId {
            point_id_options: Some(PointIdOptions::Num(42)),
        };
        assert_eq!(point_id_to_string(num_id), "42");
    }

    #[test]
    fn test_value_to_json_scalars() {
        let v = Value {
            kind: Some(Kind::StringValue("hello".to_string())),
        };
        assert_eq!(value_to_json(v), serde_json::json!("hello"));

        let v = Value {
            kind: Some(Kind::IntegerValue(7)),
        };
        assert_eq!(value_to_json(v), serde_json::json!(7));

        let v = Value {
            kind: Some(Kind::BoolValue(true)),
        };
        assert_eq!(value_to_json(v), serde_json::json!(true));

        let v = Value { kind: None };
        assert_eq!(value_to_json(v), serde_json::Value::Null);
    }

    // Requires a running Qdrant server.
    #[tokio::test]
    #[ignore]
    async fn test_connect_and_list() {
        let config = QdrantConfig::default();
        let index = QdrantIndex::connect(&config).unwrap();
        let collections = index.list_collections().await.unwrap();
        assert!(collections.len() < 10_000);
    }
}
