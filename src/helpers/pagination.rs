use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, Select};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::error::ApiResult;
use crate::schemas::Page;

/// Page-number pagination parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct PaginationQuery {
    /// Page number, starting at 1
    #[validate(range(min = 1, max = 1000000))]
    pub page: Option<u64>,
    /// Items per page
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
}

impl PaginationQuery {
    pub fn resolve(&self, default_limit: u64) -> PageParams {
        PageParams::new(self.page, self.limit, default_limit)
    }
}

/// Resolved page number and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub limit: u64,
}

impl PageParams {
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, common::MAX_PAGE),
            limit: limit.unwrap_or(default_limit).clamp(1, common::MAX_PAGE_SIZE),
        }
    }

    pub fn into_page<T>(self, results: Vec<T>, count: u64) -> Page<T> {
        let next = (self.page.saturating_mul(self.limit) < count).then(|| self.page + 1);
        let previous = (self.page > 1).then_some(self.page - 1);
        Page {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Fetch one page of `select` together with the total row count.
pub async fn fetch_page<C, E>(
    db: &C,
    select: Select<E>,
    params: PageParams,
) -> ApiResult<(Vec<E::Model>, u64)>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: FromQueryResult + Sized + Send + Sync,
{
    let paginator = select.paginate(db, params.limit);
    let count = paginator.num_items().await?;
    let rows = paginator.fetch_page(params.page - 1).await?;
    Ok((rows, count))
}
