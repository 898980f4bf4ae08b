//! Root of the SeaORM entity modules for the recipe service.
//! Join tables use composite primary keys so that uniqueness of
//! follows, favorites, cart entries and recipe ingredients is enforced
//! by the store itself.

pub mod auth_token;
pub mod favorite;
pub mod follow;
pub mod ingredient;
pub mod recipe;
pub mod recipe_ingredient;
pub mod recipe_tag;
pub mod shopping_cart;
pub mod tag;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::auth_token::Entity as AuthToken;
    pub use super::favorite::Entity as Favorite;
    pub use super::follow::Entity as Follow;
    pub use super::ingredient::Entity as Ingredient;
    pub use super::recipe::Entity as Recipe;
    pub use super::recipe_ingredient::Entity as RecipeIngredient;
    pub use super::recipe_tag::Entity as RecipeTag;
    pub use super::shopping_cart::Entity as ShoppingCart;
    pub use super::tag::Entity as Tag;
    pub use super::user::Entity as User;
}
