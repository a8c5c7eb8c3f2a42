//! Document store access for raw ingestion records.
//!
//! The store location comes from configuration and is handed to the
//! constructor; nothing here reads connection strings from the environment.

use crate::data::source::{DataBatch, DataSource};
use crate::error::{PipelineError, Result};
use serde_json::{Map, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Field the store adds to every document; never part of the dataset.
pub const DOCUMENT_ID_FIELD: &str = "_id";

pub type Document = Map<String, Value>;

/// A collection-oriented document store.
pub trait DocumentStore {
    /// Fetch every document of a collection, in insertion order.
    fn fetch(&self, database: &str, collection: &str) -> Result<Vec<Document>>;

    /// Append documents to a collection, returning how many were written.
    fn insert_many(&self, database: &str, collection: &str, docs: &[Document]) -> Result<usize>;

    /// Number of documents in a collection.
    fn count(&self, database: &str, collection: &str) -> Result<usize> {
        Ok(self.fetch(database, collection)?.len())
    }
}

/// Store rooted at a directory: `<root>/<database>/<collection>.jsonl`.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    /// Open a store from its URI. Accepts a bare path or a `file://` URI.
    pub fn open(uri: &str) -> Result<Self> {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        if path.trim().is_empty() {
            return Err(PipelineError::config("document store URI is empty"));
        }
        Ok(Self {
            root: PathBuf::from(path),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, database: &str, collection: &str) -> Result<PathBuf> {
        for part in [database, collection] {
            if part.is_empty() || part.contains(['/', '\\']) || part == ".." {
                return Err(PipelineError::config(format!(
                    "invalid database or collection name: {part:?}"
                )));
            }
        }
        Ok(self.root.join(database).join(format!("{collection}.jsonl")))
    }
}

impl DocumentStore for FileDocumentStore {
    fn fetch(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        let path = self.collection_path(database, collection)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(std::fs::File::open(&path)?);
        let mut docs = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line)? {
                Value::Object(map) => docs.push(map),
                _ => {
                    return Err(PipelineError::dataset(format!(
                        "{}:{} is not a JSON object",
                        path.display(),
                        line_no + 1
                    )));
                }
            }
        }
        Ok(docs)
    }

    fn insert_many(&self, database: &str, collection: &str, docs: &[Document]) -> Result<usize> {
        let path = self.collection_path(database, collection)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut offset = self.count(database, collection)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        for doc in docs {
            let mut doc = doc.clone();
            doc.entry(DOCUMENT_ID_FIELD)
                .or_insert_with(|| Value::String(format!("{offset:024x}")));
            offset += 1;
            serde_json::to_writer(&mut file, &doc)?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        Ok(docs.len())
    }
}

/// One collection exposed as a [`DataSource`].
pub struct CollectionSource<'a, S: DocumentStore + ?Sized> {
    pub store: &'a S,
    pub database: String,
    pub collection: String,
}

impl<S: DocumentStore + ?Sized> DataSource for CollectionSource<'_, S> {
    fn load(&self) -> Result<DataBatch> {
        let docs = self.store.fetch(&self.database, &self.collection)?;
        documents_to_batch(&docs)
    }

    fn location(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

/// Flatten documents into a batch.
///
/// Columns follow the first document's key order with `_id` dropped. Keys
/// missing from later documents become nulls, and `"na"` strings are nulls.
pub fn documents_to_batch(docs: &[Document]) -> Result<DataBatch> {
    let Some(first) = docs.first() else {
        return Ok(DataBatch::empty());
    };
    let columns: Vec<String> = first
        .keys()
        .filter(|k| k.as_str() != DOCUMENT_ID_FIELD)
        .cloned()
        .collect();

    let rows = docs
        .iter()
        .map(|doc| {
            columns
                .iter()
                .map(|col| match doc.get(col) {
                    Some(Value::String(s)) if s == "na" => Value::Null,
                    Some(v) => v.clone(),
                    None => Value::Null,
                })
                .collect()
        })
        .collect();

    DataBatch::new(columns, rows)
}

/// Turn batch rows into documents keyed by column name.
pub fn batch_to_documents(batch: &DataBatch) -> Vec<Document> {
    batch
        .rows
        .iter()
        .map(|row| {
            batch
                .columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_insert_and_fetch() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open(dir.path().to_str().unwrap()).unwrap();
        let docs = vec![doc(json!({"a": 1, "b": "x"})), doc(json!({"a": 2, "b": "y"}))];

        assert_eq!(store.insert_many("db", "coll", &docs).unwrap(), 2);
        assert_eq!(store.insert_many("db", "coll", &docs[..1]).unwrap(), 1);
        let fetched = store.fetch("db", "coll").unwrap();
        assert_eq!(fetched.len(), 3);
        assert!(fetched[0].contains_key(DOCUMENT_ID_FIELD));
        assert_ne!(fetched[0][DOCUMENT_ID_FIELD], fetched[2][DOCUMENT_ID_FIELD]);
        assert_eq!(store.count("db", "coll").unwrap(), 3);
    }

    #[test]
    fn test_fetch_missing_collection_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open(dir.path().to_str().unwrap()).unwrap();
        assert!(store.fetch("db", "nothing").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let store = FileDocumentStore::open("file:///tmp/store").unwrap();
        assert_eq!(store.root(), Path::new("/tmp/store"));
        assert!(store.fetch("..", "coll").is_err());
        assert!(store.fetch("db", "a/b").is_err());
    }

    #[test]
    fn test_documents_to_batch_drops_id_and_na() {
        let docs = vec![
            doc(json!({"_id": "1", "a": 1, "b": "na"})),
            doc(json!({"_id": "2", "a": 2})),
        ];
        let batch = documents_to_batch(&docs).unwrap();
        assert_eq!(batch.columns, vec!["a", "b"]);
        assert_eq!(batch.rows[0], vec![json!(1), Value::Null]);
        assert_eq!(batch.rows[1], vec![json!(2), Value::Null]);
    }

    #[test]
    fn test_batch_to_documents() {
        let batch = DataBatch::new(vec!["a".into()], vec![vec![json!(5)]]).unwrap();
        let docs = batch_to_documents(&batch);
        assert_eq!(docs, vec![doc(json!({"a": 5}))]);
    }
}
