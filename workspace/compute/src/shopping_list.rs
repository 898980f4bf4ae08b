use model::entities::{ingredient, recipe, recipe_ingredient, shopping_cart};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, JoinType, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};
use tracing::{debug, instrument};

use crate::error::Result;

/// One line of the exported shopping list: an ingredient and the summed amount
/// over every recipe in the cart.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

/// Sums ingredient amounts across all recipes in the user's shopping cart,
/// grouped by ingredient name and measurement unit, ordered by name.
#[instrument(skip(db))]
pub async fn aggregate_shopping_list<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Vec<ShoppingListItem>> {
    let items = recipe_ingredient::Entity::find()
        .select_only()
        .column_as(ingredient::Column::Name, "name")
        .column_as(ingredient::Column::MeasurementUnit, "measurement_unit")
        .column_as(recipe_ingredient::Column::Amount.sum(), "total_amount")
        .join(JoinType::InnerJoin, recipe_ingredient::Relation::Ingredient.def())
        .join(JoinType::InnerJoin, recipe_ingredient::Relation::Recipe.def())
        .join(JoinType::InnerJoin, recipe::Relation::ShoppingCart.def())
        .filter(shopping_cart::Column::UserId.eq(user_id))
        .group_by(ingredient::Column::Name)
        .group_by(ingredient::Column::MeasurementUnit)
        .order_by_asc(ingredient::Column::Name)
        .order_by_asc(ingredient::Column::MeasurementUnit)
        .into_model::<ShoppingListItem>()
        .all(db)
        .await?;

    debug!("Aggregated {} shopping list lines for user {}", items.len(), user_id);
    Ok(items)
}

/// Renders the list as `name (unit) - total`, one item per line.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{} ({}) - {}\n",
                item.name, item.measurement_unit, item.total_amount
            )
        })
        .collect()
}
