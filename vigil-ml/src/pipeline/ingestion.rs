//! Export a document collection into the feature store and train/test files.

use crate::artifact::DataIngestionArtifact;
use crate::cancel::{CancellationToken, checkpoint};
use crate::config::{IngestionConfig, IngestionPaths};
use crate::data::fingerprint::hash_file;
use crate::data::source::{DataSource, read_csv, write_csv};
use crate::data::split::train_test_split;
use crate::data::store::{CollectionSource, DocumentStore, batch_to_documents};
use crate::error::{PipelineError, Result};
use std::path::Path;

pub struct DataIngestion<'a, S: DocumentStore + ?Sized> {
    config: IngestionConfig,
    paths: IngestionPaths,
    store: &'a S,
    cancel: CancellationToken,
}

impl<'a, S: DocumentStore + ?Sized> DataIngestion<'a, S> {
    pub fn new(config: IngestionConfig, paths: IngestionPaths, store: &'a S) -> Self {
        Self {
            config,
            paths,
            store,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run(&self) -> Result<DataIngestionArtifact> {
        let source = CollectionSource {
            store: self.store,
            database: self.config.database.clone(),
            collection: self.config.collection.clone(),
        };
        let batch = source.load()?;
        if batch.row_count() == 0 {
            return Err(PipelineError::dataset(format!(
                "collection {} is empty",
                source.location()
            )));
        }
        tracing::info!(
            source = %source.location(),
            rows = batch.row_count(),
            columns = batch.column_count(),
            "Exported collection"
        );

        checkpoint(&self.cancel, "feature store export")?;
        write_csv(&self.paths.feature_store_file_path, &batch)?;
        let feature_store_sha256 = hash_file(&self.paths.feature_store_file_path)?;

        let (train, test) = train_test_split(
            &batch,
            self.config.train_test_split_ratio,
            self.config.random_seed,
        )?;
        checkpoint(&self.cancel, "train/test split")?;
        write_csv(&self.paths.training_file_path, &train)?;
        write_csv(&self.paths.testing_file_path, &test)?;
        tracing::info!(
            train_rows = train.row_count(),
            test_rows = test.row_count(),
            sha256 = %feature_store_sha256,
            "Performed train/test split"
        );

        Ok(DataIngestionArtifact {
            feature_store_file_path: self.paths.feature_store_file_path.clone(),
            trained_file_path: self.paths.training_file_path.clone(),
            test_file_path: self.paths.testing_file_path.clone(),
            feature_store_sha256,
            row_count: batch.row_count(),
        })
    }
}

/// Insert every row of a CSV file into `database.collection` as one document.
pub fn push_csv<S: DocumentStore + ?Sized>(
    store: &S,
    csv_path: &Path,
    database: &str,
    collection: &str,
) -> Result<usize> {
    let batch = read_csv(csv_path)?;
    let inserted = store.insert_many(database, collection, &batch_to_documents(&batch))?;
    tracing::info!(
        file = %csv_path.display(),
        database,
        collection,
        inserted,
        "Pushed records to document store"
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactLayout;
    use crate::data::store::FileDocumentStore;
    use std::io::Write;

    fn seed_store(dir: &Path, rows: usize) -> FileDocumentStore {
        let store = FileDocumentStore::open(dir.join("store").to_str().unwrap()).unwrap();
        let csv = dir.join("raw.csv");
        let mut f = std::fs::File::create(&csv).unwrap();
        writeln!(f, "a,b,Result").unwrap();
        for i in 0..rows {
            writeln!(f, "{i},na,{}", if i % 2 == 0 { 1 } else { -1 }).unwrap();
        }
        drop(f);
        push_csv(&store, &csv, "db", "coll").unwrap();
        store
    }

    #[test]
    fn test_ingestion_writes_snapshot_and_split() {
        let dir = tempfile::tempdir().unwrap();
        let store = seed_store(dir.path(), 10);
        let layout = ArtifactLayout::new(&dir.path().join("Artifacts"), chrono::Local::now());
        let config = IngestionConfig {
            database: "db".into(),
            collection: "coll".into(),
            ..IngestionConfig::default()
        };

        let artifact = DataIngestion::new(config, layout.ingestion(), &store)
            .run()
            .unwrap();
        assert_eq!(artifact.row_count, 10);
        assert_eq!(artifact.feature_store_sha256.len(), 64);

        let train = read_csv(&artifact.trained_file_path).unwrap();
        let test = read_csv(&artifact.test_file_path).unwrap();
        assert_eq!(train.row_count(), 8);
        assert_eq!(test.row_count(), 2);
        assert_eq!(train.columns, vec!["a", "b", "Result"]);
        assert!(train.column("b").unwrap().iter().all(|v| v.is_null()));
    }

    #[test]
    fn test_empty_collection_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path().to_str().unwrap()).unwrap();
        let layout = ArtifactLayout::new(dir.path(), chrono::Local::now());
        let err = DataIngestion::new(IngestionConfig::default(), layout.ingestion(), &store)
            .run()
            .unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(_)));
    }
}
