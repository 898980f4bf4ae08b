pub mod images;
pub mod pagination;
