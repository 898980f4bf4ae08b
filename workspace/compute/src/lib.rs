//! Read-side computations that go beyond single-entity lookups.

pub mod error;
pub mod shopping_list;

pub use error::{ComputeError, Result};
pub use shopping_list::{ShoppingListItem, aggregate_shopping_list, render_shopping_list};
