pub mod initdb;
pub mod load_ingredients;
pub mod load_tags;
pub mod migrate_and_serve;
pub mod serve;

pub use initdb::init_database;
pub use load_ingredients::load_ingredients;
pub use load_tags::load_tags;
pub use migrate_and_serve::migrate_and_serve;
pub use serve::serve;
