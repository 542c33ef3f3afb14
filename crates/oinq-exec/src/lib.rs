//! Deferred query execution
//!
//! A `Query<T>` records combinators; a `QueryProvider` translates the chain
//! on demand, hands the script to a `DataSource` and projects the rows it
//! returns back into host values.

mod provider;
mod query;
pub mod source;

pub use provider::{QueryError, QueryProvider, QueryResult};
pub use query::{Element, Group, Query, Record, SingleQuery};
pub use source::{DataSource, ExecutorError, MockDataSource, RawRow};
