pub mod db;
pub mod entities;
pub mod pricing;
pub mod seaorm;
pub mod sinks;
pub mod snapshot;
pub mod storage;

pub use seaorm::SeaOrmStorage;
pub use sinks::DbEventSink;
pub use snapshot::{
    CredentialRow, GlobalConfigRow, ProviderRow, StorageSnapshot, UserKeyRow, UserRow,
};
pub use storage::{
    LogQueryFilter, LogQueryResult, LogRecord, LogRecordKind, ModelUsageAggregate, Storage,
    StorageError, StorageResult, UsageAggregate, UsageAggregateFilter,
};
