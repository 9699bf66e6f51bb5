use axum::{debug_handler, extract::State};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    appresult::{AppError, AppResult},
    extract::{Json, Query},
    models::{Category, FurnishStatus, House, HouseStatus},
    AppState,
};

use super::PageSize;

/// Query-string filters for the public listing. All given filters must hold.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct HouseFilter {
    pub page: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub category: Option<Category>,
    pub furnish_status: Option<FurnishStatus>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub location: Option<String>,
    pub status: Option<HouseStatus>,
    pub area_code: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HousePage {
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub houses: Vec<House>,
}

impl HouseFilter {
    fn push_conditions<'a>(&'a self, builder: &mut QueryBuilder<'a, Sqlite>) {
        builder.push(" WHERE 1=1");
        if let Some(min_price) = self.min_price {
            builder.push(" AND price >= ").push_bind(min_price);
        }
        if let Some(max_price) = self.max_price {
            builder.push(" AND price <= ").push_bind(max_price);
        }
        if let Some(category) = self.category {
            builder.push(" AND category = ").push_bind(category);
        }
        if let Some(furnish_status) = self.furnish_status {
            builder.push(" AND furnish_status = ").push_bind(furnish_status);
        }
        if let Some(bedrooms) = self.bedrooms {
            builder.push(" AND bedrooms = ").push_bind(bedrooms);
        }
        if let Some(bathrooms) = self.bathrooms {
            builder.push(" AND bathrooms = ").push_bind(bathrooms);
        }
        if let Some(location) = self.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            builder
                .push(" AND instr(lower(location), lower(")
                .push_bind(location)
                .push(")) > 0");
        }
        if let Some(status) = self.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(area_code) = self.area_code {
            builder.push(" AND area_code = ").push_bind(area_code);
        }
    }
}

pub async fn query_houses(db_pool: &SqlitePool, filter: &HouseFilter, PageSize(page_size): PageSize) -> AppResult<HousePage> {
    let page = filter.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    let offset = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| AppError::bad_request("page is out of range"))?;
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            return Err(AppError::bad_request("min_price cannot exceed max_price"));
        }
    }

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM houses");
    filter.push_conditions(&mut count);
    let (total_count,): (i64,) = count.build_query_as().fetch_one(db_pool).await?;

    let mut select = QueryBuilder::new("SELECT * FROM houses");
    filter.push_conditions(&mut select);
    select
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(page_size)
        .push(" OFFSET ")
        .push_bind(offset);
    let houses: Vec<House> = select.build_query_as().fetch_all(db_pool).await?;

    Ok(HousePage { total_count, page, page_size, houses })
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_houses(
    State(db_pool): State<SqlitePool>,
    State(page_size): State<PageSize>,
    Query(filter): Query<HouseFilter>,
) -> AppResult<Json<HousePage>> {
    Ok(Json(query_houses(&db_pool, &filter, page_size).await?))
}
