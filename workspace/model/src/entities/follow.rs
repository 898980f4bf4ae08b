use super::user;
use sea_orm::entity::prelude::*;

/// Directed subscription edge: `user_id` follows `following_id`.
/// The pair is the primary key and the store rejects self-follows.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "follows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub following_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The subscriber.
    #[sea_orm(belongs_to = "user::Entity", from = "Column::UserId", to = "user::Column::Id")]
    Subscriber,
    /// The author being followed.
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::FollowingId",
        to = "user::Column::Id"
    )]
    Author,
}

impl ActiveModelBehavior for ActiveModel {}
