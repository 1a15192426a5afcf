//! Paginated query engine: allow-listed filter/order parsing and page execution over JSON rows.

mod executor;
mod field;
mod parse;
mod record;

pub use executor::{ListParams, Page, PageRequest, QueryConfig, QueryExecutor};
pub use field::{parse_timestamp, AllowList, Comparator, FieldDescriptor, FieldPath, FieldValue};
pub use parse::{parse_filters, parse_order, FilterPredicate, OrderKey};
pub use record::{is_deleted_flag, Record};
