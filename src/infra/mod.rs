//! Infrastructure: SQLite connection, schema, ID sequences.

pub mod db;
pub mod schema;
pub mod sequence;

pub(crate) use db::write_tx;
pub use db::{get_connection, init_db, init_test_db, open_db, DbPool};
pub use schema::{init_schema, table_exists, EntityInit, InitReport};
pub use sequence::sequence_peek;
