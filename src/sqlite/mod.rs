// SQLite backend
//
// - config: bb8 manager and pool construction
// - params: `RowValues` to rusqlite values
// - query: result extraction
// - executor: statement and script execution on the blocking pool

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::SqliteManager;
pub use executor::{execute, execute_batch};
pub use params::Params;
pub use query::build_result_set;
