//! LanceDB-backed passage store implementation.
//!
//! The on-disk persistence format is LanceDB's concern; this module only
//! maps passages to the table schema and pushes the device-type filter
//! down as a metadata-equality predicate.

use crate::embeddings::cosine_similarity;
use crate::store::PassageStore;
use crate::types::{Passage, PassageRecord};
use arrow_array::{Array, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use homeops_core::{AppError, AppResult};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Table;
use std::path::Path;
use std::sync::Arc;

/// LanceDB-backed passage store.
pub struct LancePassageStore {
    table: Table,
    embedding_dim: usize,
}

impl LancePassageStore {
    /// Create or open a LanceDB store at the specified path.
    ///
    /// # Arguments
    /// * `db_path` - Directory path for the LanceDB database
    /// * `table_name` - Name of the table (typically "passages")
    /// * `embedding_dim` - Dimension of embedding vectors
    pub async fn new(db_path: &Path, table_name: &str, embedding_dim: usize) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Retrieval(format!("Failed to create index directory: {}", e))
            })?;
        }

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.contains(&table_name.to_string()) {
            conn.open_table(table_name)
                .execute()
                .await
                .map_err(|e| AppError::Retrieval(format!("Failed to open table: {}", e)))?
        } else {
            let schema = Self::create_schema(embedding_dim);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                table_name,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to create table: {}", e)))?
        };

        tracing::debug!("Initialized LanceDB passage store at {:?}", db_path);

        Ok(Self {
            table,
            embedding_dim,
        })
    }

    /// Arrow schema for the passages table.
    fn create_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source_doc", DataType::Utf8, false),
            Field::new("section", DataType::Utf8, true),
            Field::new("device_type", DataType::Utf8, true),
            Field::new("device_name", DataType::Utf8, true),
            Field::new("manufacturer", DataType::Utf8, true),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Convert passage records to a single Arrow RecordBatch.
    fn records_to_batch(&self, records: &[PassageRecord]) -> AppResult<RecordBatch> {
        let schema = Self::create_schema(self.embedding_dim);

        let mut embedding_values = Vec::with_capacity(records.len() * self.embedding_dim);
        for record in records {
            let embedding = record.embedding.as_ref().ok_or_else(|| {
                AppError::Retrieval(format!("Passage '{}' missing embedding", record.id))
            })?;

            if embedding.len() != self.embedding_dim {
                return Err(AppError::Retrieval(format!(
                    "Embedding dimension mismatch for '{}': expected {}, got {}",
                    record.id,
                    self.embedding_dim,
                    embedding.len()
                )));
            }

            embedding_values.extend_from_slice(embedding);
        }

        let embedding_array = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(arrow_array::Float32Array::from(embedding_values)),
            None,
        );

        let id_array = StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()));
        let source_array =
            StringArray::from_iter_values(records.iter().map(|r| r.source_doc.as_str()));
        let section_array =
            StringArray::from_iter(records.iter().map(|r| r.section.as_deref()));
        let device_type_array =
            StringArray::from_iter(records.iter().map(|r| r.device_type.as_deref()));
        let device_name_array =
            StringArray::from_iter(records.iter().map(|r| r.device_name.as_deref()));
        let manufacturer_array =
            StringArray::from_iter(records.iter().map(|r| r.manufacturer.as_deref()));
        let text_array = StringArray::from_iter_values(records.iter().map(|r| r.text.as_str()));

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(id_array),
                Arc::new(source_array),
                Arc::new(section_array),
                Arc::new(device_type_array),
                Arc::new(device_name_array),
                Arc::new(manufacturer_array),
                Arc::new(text_array),
                Arc::new(embedding_array),
            ],
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Convert one Arrow RecordBatch row back into a record.
    fn batch_to_record(&self, batch: &RecordBatch, row_idx: usize) -> AppResult<PassageRecord> {
        fn string_col(batch: &RecordBatch, col: usize, name: &str) -> AppResult<StringArray> {
            batch
                .column(col)
                .as_any()
                .downcast_ref::<StringArray>()
                .cloned()
                .ok_or_else(|| AppError::Retrieval(format!("Invalid {} column", name)))
        }

        fn optional_value(array: &StringArray, row_idx: usize) -> Option<String> {
            if array.is_null(row_idx) {
                None
            } else {
                let value = array.value(row_idx);
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
        }

        let id = string_col(batch, 0, "id")?.value(row_idx).to_string();
        let source_doc = string_col(batch, 1, "source_doc")?.value(row_idx).to_string();
        let section = optional_value(&string_col(batch, 2, "section")?, row_idx);
        let device_type = optional_value(&string_col(batch, 3, "device_type")?, row_idx);
        let device_name = optional_value(&string_col(batch, 4, "device_name")?, row_idx);
        let manufacturer = optional_value(&string_col(batch, 5, "manufacturer")?, row_idx);
        let text = string_col(batch, 6, "text")?.value(row_idx).to_string();

        let embedding_list = batch
            .column(7)
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| AppError::Retrieval("Invalid embedding column".to_string()))?;

        let embedding_array_ref = embedding_list.value(row_idx);
        let embedding_values = embedding_array_ref
            .as_any()
            .downcast_ref::<arrow_array::Float32Array>()
            .ok_or_else(|| AppError::Retrieval("Invalid embedding values".to_string()))?;

        let embedding: Vec<f32> = (0..embedding_values.len())
            .map(|i| embedding_values.value(i))
            .collect();

        Ok(PassageRecord {
            id,
            text,
            source_doc,
            section,
            device_type,
            device_name,
            manufacturer,
            embedding: Some(embedding),
        })
    }

    /// Build the metadata-equality predicate for a device filter.
    ///
    /// Device types are normalized to [a-z0-9_] at intake; anything else
    /// is stripped here so the values are safe inside the SQL predicate.
    fn device_predicate(device_filter: &[String]) -> Option<String> {
        let values: Vec<String> = device_filter
            .iter()
            .map(|d| {
                d.chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect::<String>()
            })
            .filter(|d| !d.is_empty())
            .map(|d| format!("'{}'", d))
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(format!("device_type IN ({})", values.join(", ")))
        }
    }
}

#[async_trait::async_trait]
impl PassageStore for LancePassageStore {
    async fn upsert_passages(&self, records: &[PassageRecord]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let batch = self.records_to_batch(records)?;

        self.table
            .add(RecordBatchIterator::new(
                vec![Ok(batch.clone())],
                batch.schema(),
            ))
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to add passages: {}", e)))?;

        tracing::debug!("Inserted {} passages into LanceDB", records.len());
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        device_filter: Option<&[String]>,
    ) -> AppResult<Vec<Passage>> {
        if query_embedding.len() != self.embedding_dim {
            return Err(AppError::Retrieval(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                query_embedding.len()
            )));
        }

        let mut query = self
            .table
            .query()
            .nearest_to(query_embedding.to_vec())
            .map_err(|e| AppError::Retrieval(format!("Failed to create query: {}", e)))?
            .limit(top_k);

        if let Some(predicate) = device_filter.and_then(Self::device_predicate) {
            tracing::debug!("Applying device filter predicate: {}", predicate);
            query = query.only_if(predicate);
        }

        let batches = query
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to collect results: {}", e)))?;

        let mut passages = Vec::new();

        for batch in &batches {
            for row_idx in 0..batch.num_rows() {
                let record = match self.batch_to_record(batch, row_idx) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Failed to convert batch row {} to passage: {}", row_idx, e);
                        continue;
                    }
                };

                let score = record
                    .embedding
                    .as_ref()
                    .map(|emb| cosine_similarity(query_embedding, emb))
                    .unwrap_or(0.0);

                passages.push(record.to_passage(score));
            }
        }

        // Stable sort keeps index order for equal scores
        passages.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        passages.truncate(top_k);

        tracing::debug!(
            "Retrieved {} passages (requested top-{})",
            passages.len(),
            top_k
        );

        Ok(passages)
    }

    async fn stats(&self) -> AppResult<(u32, u32)> {
        let count = self
            .table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to count rows: {}", e)))?;

        // Distinct source docs are not tracked separately; approximate by
        // scanning is avoidable overhead, so report passage count for both
        // until a caller needs the split.
        Ok((count as u32, count as u32))
    }

    async fn reset(&self) -> AppResult<()> {
        let count = self.table.count_rows(None).await.unwrap_or(0);

        if count > 0 {
            self.table
                .delete("id IS NOT NULL")
                .await
                .map_err(|e| AppError::Retrieval(format!("Failed to reset index: {}", e)))?;
        }

        tracing::info!("Reset LanceDB passage store");
        Ok(())
    }
}
