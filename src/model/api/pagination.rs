use rocket::request::{FromRequest, Outcome, Request};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::api::query::StrictQuery;

pub const DEFAULT_PAGE_NUM: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Raw pagination query parameters.
#[derive(Debug, Default)]
pub struct PaginationRequest {
    pub page_num: Option<u64>,
    pub page_size: Option<u64>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PaginationRequest {
    type Error = Error;

    /// Read `page_num` and `page_size` from the query, rejecting values
    /// that are not numbers.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let mut query = StrictQuery::new(req);
        let request = Self {
            page_num: query.get("page_num"),
            page_size: query.get("page_size"),
        };
        query.finish(request)
    }
}

impl PaginationRequest {
    /// Apply defaults and check bounds.
    pub fn validate(&self) -> Result<Pagination> {
        let page_num = self.page_num.unwrap_or(DEFAULT_PAGE_NUM);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        let mut errors = Vec::new();
        if page_num < 1 {
            errors.push("page_num must be at least 1".to_string());
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            errors.push(format!("page_size must be between 1 and {MAX_PAGE_SIZE}"));
        }
        // The store takes a signed skip.
        let skip = page_num.saturating_sub(1).checked_mul(page_size);
        if errors.is_empty() && skip.map_or(true, |skip| skip > i64::MAX as u64) {
            errors.push("page_num is too large".to_string());
        }
        if errors.is_empty() {
            Ok(Pagination {
                page_num,
                page_size,
            })
        } else {
            Err(Error::Validation(errors))
        }
    }
}

/// Checked pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_num: u64,
    page_size: u64,
}

impl Pagination {
    pub fn page_num(&self) -> u64 {
        self.page_num
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of items before the requested page.
    pub fn skip(&self) -> u64 {
        (self.page_num - 1) * self.page_size
    }

    /// Wrap a page of items with the pagination metadata.
    pub fn paginated<T>(self, items: Vec<T>, total: u64) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num,
                page_size: self.page_size,
                total,
            },
        }
    }
}

/// One page of items.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub page_num: u64,
    pub page_size: u64,
    pub total: u64,
}
