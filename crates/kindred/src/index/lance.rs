use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray, TimestampMicrosecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::TryStreamExt;
use lancedb::Table;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SalienceConfig;
use crate::embedding::Embedder;
use crate::error::{KindredError, Result};
use crate::index::{
    PersistentMemoryIndex, RetrievedRecord, cosine_similarity, embed_blocking, newest_first,
    rank_matches,
};
use crate::memory::salience::refresh_salience;
use crate::memory::types::{MemoryKind, MemoryRecord, OwnerId};

const MEMORIES_TABLE: &str = "memories";

/// Rows fetched per requested match so ties at the cut-off are ranked together
const CANDIDATE_MULTIPLIER: usize = 3;

/// Persistent index backed by a LanceDB table
///
/// One row per record. Searches run an owner-filtered nearest-neighbour
/// query and re-score candidates with cosine similarity before ranking.
pub struct LanceMemoryIndex {
    table: Table,
    embedder: Arc<dyn Embedder>,
    dimension: i32,
    salience: SalienceConfig,
}

impl LanceMemoryIndex {
    /// Open the memories table under `path`, creating it if needed
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::open_with_salience(path, embedder, SalienceConfig::default()).await
    }

    pub async fn open_with_salience(
        path: &Path,
        embedder: Arc<dyn Embedder>,
        salience: SalienceConfig,
    ) -> Result<Self> {
        let uri = path
            .to_str()
            .ok_or_else(|| KindredError::Storage("Invalid path encoding".to_string()))?;
        let dimension = i32::try_from(embedder.dimension())
            .map_err(|_| KindredError::Storage("Embedding dimension too large".to_string()))?;

        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| KindredError::Storage(format!("Failed to connect to LanceDB: {e}")))?;

        let names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| KindredError::Storage(format!("Failed to list tables: {e}")))?;

        let table = if names.iter().any(|n| n == MEMORIES_TABLE) {
            debug!("Opening existing memories table");
            connection
                .open_table(MEMORIES_TABLE)
                .execute()
                .await
                .map_err(|e| KindredError::Storage(format!("Failed to open memories table: {e}")))?
        } else {
            info!("Creating memories table at {}", path.display());
            let schema = Self::schema(dimension);
            let batch = Self::empty_batch(schema.clone(), dimension)?;
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            connection
                .create_table(MEMORIES_TABLE, Box::new(batches))
                .execute()
                .await
                .map_err(|e| {
                    KindredError::Storage(format!("Failed to create memories table: {e}"))
                })?
        };

        Ok(Self {
            table,
            embedder,
            dimension,
            salience,
        })
    }

    fn schema(dimension: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("owner", DataType::Utf8, false),
            Field::new("kind", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
            Field::new(
                "created_at",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("hit_count", DataType::Int32, false),
        ]))
    }

    fn empty_batch(schema: Arc<Schema>, dimension: i32) -> Result<RecordBatch> {
        Self::rows_to_batch(&[], schema, dimension)
    }

    /// Build a batch from `(record, embedding)` rows
    fn rows_to_batch(
        rows: &[(&MemoryRecord, &[f32])],
        schema: Arc<Schema>,
        dimension: i32,
    ) -> Result<RecordBatch> {
        let ids: Vec<String> = rows.iter().map(|(r, _)| r.id().to_string()).collect();
        let owners: Vec<&str> = rows.iter().map(|(r, _)| r.owner().as_str()).collect();
        let kinds: Vec<&str> = rows.iter().map(|(r, _)| r.kind().as_str()).collect();
        let contents: Vec<&str> = rows.iter().map(|(r, _)| r.content()).collect();
        let embeddings: Vec<Option<Vec<Option<f32>>>> = rows
            .iter()
            .map(|(_, e)| Some(e.iter().map(|&v| Some(v)).collect()))
            .collect();
        let created_at: Vec<i64> = rows
            .iter()
            .map(|(r, _)| r.created_at().timestamp_micros())
            .collect();
        let hit_counts: Vec<i32> = rows
            .iter()
            .map(|(r, _)| i32::try_from(r.hit_count()).unwrap_or(i32::MAX))
            .collect();

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(owners)),
                Arc::new(StringArray::from(kinds)),
                Arc::new(StringArray::from(contents)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(embeddings, dimension)),
                Arc::new(TimestampMicrosecondArray::from(created_at).with_timezone("UTC")),
                Arc::new(Int32Array::from(hit_counts)),
            ],
        )
        .map_err(|e| KindredError::Storage(format!("Failed to create RecordBatch: {e}")))
    }

    /// Decode every row of a batch, keeping the stored embedding
    fn batch_to_records(batch: &RecordBatch) -> Result<Vec<MemoryRecord>> {
        let ids = column::<StringArray>(batch, "id")?;
        let owners = column::<StringArray>(batch, "owner")?;
        let kinds = column::<StringArray>(batch, "kind")?;
        let contents = column::<StringArray>(batch, "content")?;
        let embeddings = column::<FixedSizeListArray>(batch, "embedding")?;
        let created = column::<TimestampMicrosecondArray>(batch, "created_at")?;
        let hits = column::<Int32Array>(batch, "hit_count")?;

        let mut records = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let id = Uuid::parse_str(ids.value(row))
                .map_err(|e| KindredError::Storage(format!("Failed to parse UUID: {e}")))?;
            let owner = OwnerId::try_from(owners.value(row))?;
            let kind = MemoryKind::parse(kinds.value(row)).ok_or_else(|| {
                KindredError::Storage(format!("Unknown memory kind: {}", kinds.value(row)))
            })?;
            let created_at = Utc
                .timestamp_micros(created.value(row))
                .single()
                .ok_or_else(|| {
                    KindredError::Storage("Failed to parse created_at timestamp".to_string())
                })?;

            let embedding_list = embeddings.value(row);
            let embedding_values = embedding_list
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| {
                    KindredError::Storage("Failed to get embedding values".to_string())
                })?;

            let record = MemoryRecord::from_parts(
                id,
                owner,
                kind,
                contents.value(row).to_string(),
                created_at,
                hits.value(row).max(0) as u32,
            )
            .with_embedding(embedding_values.values().to_vec());
            records.push(record);
        }
        Ok(records)
    }

    async fn search_inner(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<RetrievedRecord>> {
        let query_embedding = embed_blocking(&self.embedder, query).await?;

        let stream = self
            .table
            .query()
            .nearest_to(query_embedding.as_slice())
            .map_err(|e| KindredError::Storage(format!("Failed to create vector query: {e}")))?
            .only_if(format!("owner = '{owner}'"))
            .limit(limit.saturating_mul(CANDIDATE_MULTIPLIER))
            .execute()
            .await
            .map_err(|e| KindredError::Storage(format!("Failed to execute search: {e}")))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| KindredError::Storage(format!("Failed to collect search results: {e}")))?;

        let mut candidates = Vec::new();
        for batch in &batches {
            for record in Self::batch_to_records(batch)? {
                let similarity = record
                    .embedding()
                    .map(|e| cosine_similarity(&query_embedding, e))
                    .unwrap_or(0.0);
                candidates.push(RetrievedRecord { record, similarity });
            }
        }

        let mut ranked = rank_matches(candidates, limit);
        if !ranked.is_empty() {
            self.record_hits(&ranked).await;
        }

        let now = Utc::now();
        for hit in &mut ranked {
            hit.record.record_hit();
            refresh_salience(&mut hit.record, now, &self.salience);
        }
        Ok(ranked)
    }

    /// Bump the stored hit counter of every returned row.
    ///
    /// Failure only costs salience accuracy, so it is logged, not returned.
    async fn record_hits(&self, hits: &[RetrievedRecord]) {
        let ids = hits
            .iter()
            .map(|h| format!("'{}'", h.record.id()))
            .collect::<Vec<_>>()
            .join(", ");

        if let Err(e) = self
            .table
            .update()
            .only_if(format!("id IN ({ids})"))
            .column("hit_count", "hit_count + 1")
            .execute()
            .await
        {
            warn!("Failed to update hit counts: {}", e);
        }
    }

    async fn list_inner(
        &self,
        owner: &OwnerId,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .only_if(format!("owner = '{owner}' AND kind = '{}'", kind.as_str()))
            .execute()
            .await
            .map_err(|e| KindredError::Storage(format!("Failed to execute listing: {e}")))?
            .try_collect()
            .await
            .map_err(|e| KindredError::Storage(format!("Failed to collect listing: {e}")))?;

        let mut records = Vec::new();
        for batch in &batches {
            records.extend(Self::batch_to_records(batch)?);
        }
        Ok(newest_first(records, limit))
    }

    async fn add_inner(&self, record: MemoryRecord) -> Result<Uuid> {
        let embedding = match record.embedding() {
            Some(embedding) => embedding.to_vec(),
            None => embed_blocking(&self.embedder, record.content()).await?,
        };
        if embedding.len() != self.dimension as usize {
            return Err(KindredError::Embedding(format!(
                "Expected {} dimensions, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        let schema = Self::schema(self.dimension);
        let batch = Self::rows_to_batch(
            &[(&record, embedding.as_slice())],
            schema.clone(),
            self.dimension,
        )?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        self.table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| KindredError::Storage(format!("Failed to insert memory: {e}")))?;

        debug!("Stored {} record {} for {}", record.kind(), record.id(), record.owner());
        Ok(record.id())
    }
}

#[async_trait]
impl PersistentMemoryIndex for LanceMemoryIndex {
    async fn search(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<RetrievedRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.search_inner(query, owner, limit)
            .await
            .map_err(KindredError::into_memory_unavailable)
    }

    async fn list(
        &self,
        owner: &OwnerId,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.list_inner(owner, kind, limit)
            .await
            .map_err(KindredError::into_memory_unavailable)
    }

    async fn add(&self, record: MemoryRecord) -> Result<Uuid> {
        self.add_inner(record)
            .await
            .map_err(KindredError::into_memory_unavailable)
    }

    async fn count(&self, owner: &OwnerId) -> Result<usize> {
        self.table
            .count_rows(Some(format!("owner = '{owner}'")))
            .await
            .map_err(|e| KindredError::MemoryUnavailable(format!("Failed to count rows: {e}")))
    }

    fn name(&self) -> &'static str {
        "lance"
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| KindredError::Storage(format!("Failed to get {name} column")))
}
