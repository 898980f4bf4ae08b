//! Validation rules shared by the HTTP layer and the fixture loaders.
//! Field limits mirror the column sizes declared in the migrations.

mod tags;
pub mod validators;

pub use tags::TagDefinition;
pub use validators::{validate_color, validate_slug, validate_username};

/// Default number of items per page for paginated listings.
pub const DEFAULT_PAGE_SIZE: u64 = 6;

/// Upper bound accepted for the `limit` query parameter.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Highest page number accepted; keeps the row offset far from overflow.
pub const MAX_PAGE: u64 = 1_000_000;
