//! Data layer: batches, schema, sources, the document store and splitting.

pub mod fingerprint;
pub mod schema;
pub mod source;
pub mod split;
pub mod store;
pub mod transform;

pub use schema::{ColumnKind, ColumnSchema, ColumnType, SchemaDefinition};
pub use source::{CsvSource, DataBatch, DataSource, read_csv, write_csv};
pub use split::train_test_split;
pub use store::{CollectionSource, Document, DocumentStore, FileDocumentStore};
pub use transform::{FeatureMatrix, KnnImputer, TransformedDataset, split_features_target};
