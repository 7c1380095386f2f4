use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Extension,
};
use serde::Deserialize;

use crate::http::error::{ApiError, ApiResult, Data};
use crate::http::server::AppState;
use crate::security::auth::Identity;
use crate::store::{FeedItem, FeedQuery, SortOrder};

const MAX_LIMIT: i64 = 100;
const MAX_TAGS: usize = 5;
const MAX_SEARCH: usize = 100;

/// Raw `?limit=&offset=&sort=&tags=a,b&search=` parameters.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
}

impl FeedParams {
    pub fn into_query(self) -> Result<FeedQuery, ApiError> {
        let mut query = FeedQuery::default();

        if let Some(limit) = self.limit {
            if !(1..=MAX_LIMIT).contains(&limit) {
                return Err(ApiError::BadRequest(format!(
                    "limit must be between 1 and {MAX_LIMIT}"
                )));
            }
            query.limit = limit as usize;
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(ApiError::BadRequest("offset must not be negative".into()));
            }
            query.offset = offset as usize;
        }
        query.sort = match self.sort.as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(ApiError::BadRequest(format!(
                    "sort must be 'asc' or 'desc', got '{other}'"
                )))
            }
        };
        if let Some(tags) = self.tags {
            query.tags = tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            if query.tags.len() > MAX_TAGS {
                return Err(ApiError::BadRequest(format!(
                    "at most {MAX_TAGS} tags are allowed"
                )));
            }
        }
        if let Some(search) = self.search {
            if search.chars().count() > MAX_SEARCH {
                return Err(ApiError::BadRequest(format!(
                    "search must be at most {MAX_SEARCH} characters"
                )));
            }
            query.search = search;
        }
        Ok(query)
    }
}

pub async fn user_feed(
    State(state): State<AppState>,
    Extension(Identity(user)): Extension<Identity>,
    params: Result<Query<FeedParams>, QueryRejection>,
) -> ApiResult<Data<Vec<FeedItem>>> {
    let Query(params) = params?;
    let query = params.into_query()?;
    let feed = state.store(state.storage.posts.feed(user.id, &query)).await?;
    Ok(Data(feed))
}
