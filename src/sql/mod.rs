//! Safe SQL builder: identifiers from config only, values as parameters.

mod builder;
mod params;
pub use builder::*;
pub use params::PgBindValue;
