// PostgreSQL backend
//
// - config: bb8 manager, TLS selection and pool construction
// - params: binding `RowValues` to Postgres parameter types
// - numeric: decimal text to and from the NUMERIC wire format
// - query: result extraction
// - executor: statement and script execution on a pooled client

pub mod config;
pub mod executor;
pub mod numeric;
pub mod params;
pub mod query;

pub use config::PgManager;
pub use executor::{execute, execute_batch};
pub use params::Params;
pub use query::build_result_set_from_statement;
