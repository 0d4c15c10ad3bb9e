//! Database initialization, schema definitions and migrations

pub mod init;
pub mod migrations;
pub mod schema_sync;
pub mod table_schemas;

pub use init::*;
pub use migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};
pub use schema_sync::{ColumnDefinition, SchemaIntrospector, SchemaSync, TableSchema};
pub use table_schemas::*;
