use anyhow::{anyhow, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use vidseek_core::traits::{Embedder, VectorStore};
use vidseek_core::types::{DocumentFilter, DocumentType, Meta, ScoredDocument, StoredDocument};

use crate::schema::build_documents_schema;
use crate::table::{filter_predicate, open_db, quote, table_exists};

const INSERT_BATCH: usize = 1000;

/// Description and transcript documents in a single LanceDB table.
pub struct LanceVectorStore {
    db: Connection,
    table_name: String,
    embedder: Arc<dyn Embedder>,
}

impl LanceVectorStore {
    pub async fn open(db_path: &Path, table_name: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db = open_db(db_path.to_string_lossy().as_ref()).await?;
        Ok(Self { db, table_name: table_name.to_string(), embedder })
    }

    fn dim(&self) -> Result<i32> {
        i32::try_from(self.embedder.dim()).map_err(|_| anyhow!("embedding dim out of range"))
    }

    async fn insert_batch(&self, docs: &[StoredDocument], vectors: Vec<Vec<f32>>) -> Result<()> {
        let record_batch = docs_to_record_batch(docs, vectors, self.dim()?)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        if table_exists(&self.db, &self.table_name).await? {
            let table = self.db.open_table(&self.table_name).execute().await?;
            let mut merge = table.merge_insert(&["id"]);
            merge.when_matched_update_all(None).when_not_matched_insert_all();
            merge.execute(reader).await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn add(&self, docs: &[StoredDocument]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        for chunk in docs.chunks(INSERT_BATCH) {
            let texts: Vec<String> = chunk.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            if vectors.len() != chunk.len() {
                return Err(anyhow!("embedder returned {} vectors for {} texts", vectors.len(), chunk.len()));
            }
            self.insert_batch(chunk, vectors).await?;
        }
        info!(table = %self.table_name, count = docs.len(), "documents upserted");
        Ok(docs.len())
    }

    async fn query(&self, text: &str, n: usize, document_type: DocumentType) -> Result<Vec<ScoredDocument>> {
        if n == 0 || !table_exists(&self.db, &self.table_name).await? {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector"))?;
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut stream = table
            .vector_search(query_vec)?
            .distance_type(DistanceType::Cosine)
            .only_if(format!("document_type = {}", quote(document_type.as_str())))
            .limit(n)
            .execute()
            .await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_documents(&batch)?);
        }
        out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        debug!(document_type = %document_type, requested = n, returned = out.len(), "vector query");
        Ok(out)
    }

    async fn get(&self, filter: &DocumentFilter) -> Result<Vec<ScoredDocument>> {
        if !table_exists(&self.db, &self.table_name).await? {
            return Ok(Vec::new());
        }
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut query = table.query();
        if let Some(pred) = filter_predicate(filter) {
            query = query.only_if(pred);
        }
        let mut stream = query.execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            out.extend(batch_to_documents(&batch)?);
        }
        Ok(out)
    }
}

pub fn docs_to_record_batch(docs: &[StoredDocument], vectors: Vec<Vec<f32>>, dim: i32) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(docs.len());
    let mut paths = Vec::with_capacity(docs.len());
    let mut types = Vec::with_capacity(docs.len());
    let mut texts = Vec::with_capacity(docs.len());
    let mut metas = Vec::with_capacity(docs.len());
    for doc in docs {
        ids.push(doc.id.clone());
        paths.push(doc.video_path.clone());
        types.push(doc.document_type.as_str().to_string());
        texts.push(doc.text.clone());
        metas.push(serde_json::to_string(&doc.metadata)?);
    }
    let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));
    Ok(RecordBatch::try_new(
        build_documents_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(paths)),
            Arc::new(StringArray::from(types)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(metas)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
        ],
    )?)
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

/// Rows to documents. `_distance` is absent on plain scans; those rows get 0.
fn batch_to_documents(batch: &RecordBatch) -> Result<Vec<ScoredDocument>> {
    let ids = string_col(batch, "id")?;
    let paths = string_col(batch, "video_path")?;
    let types = string_col(batch, "document_type")?;
    let texts = string_col(batch, "text")?;
    let metas = string_col(batch, "metadata")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let mut metadata = parse_metadata(metas.value(i));
        metadata.insert("video_path".into(), paths.value(i).to_string());
        metadata.insert("document_type".into(), types.value(i).to_string());
        let distance = distances.filter(|d| !d.is_null(i)).map_or(0.0, |d| d.value(i));
        out.push(ScoredDocument {
            id: ids.value(i).to_string(),
            metadata,
            distance,
            document: texts.value(i).to_string(),
        });
    }
    Ok(out)
}

fn parse_metadata(raw: &str) -> Meta {
    let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw).unwrap_or_default();
    parsed
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_metadata;

    #[test]
    fn metadata_values_are_stringified() {
        let m = parse_metadata(r#"{"scene":"beach","fps":30}"#);
        assert_eq!(m.get("scene").map(String::as_str), Some("beach"));
        assert_eq!(m.get("fps").map(String::as_str), Some("30"));
        assert!(parse_metadata("not json").is_empty());
    }
}
