//! Dataset validation: schema column checks and distribution drift.

pub mod columns;
pub mod drift;

pub use columns::{ColumnCheck, SchemaMode, validate_columns, validate_no_of_columns};
pub use drift::{
    ColumnDriftRecord, DriftDetector, DriftMethod, DriftOutcome, DriftReport, DriftStrategy,
    KolmogorovSmirnov, L1Distance, SkipReason, SkippedColumn,
};
