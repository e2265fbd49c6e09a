//! Page-number pagination over ordered listings.
//!
//! Listings are sliced with `LIMIT/OFFSET` after counting the full result.
//! Requested page numbers never fail: garbage means the first page and
//! out-of-range numbers clamp to the first or last page.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Future, Ready};

/// Fixed page size of every post listing
pub const POSTS_PER_PAGE: i64 = 10;

/// `?page=` query parameter. The last occurrence wins and a query string
/// that does not parse at all reads as no page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn from_query_string(query: &str) -> Self {
        let page = web::Query::<Vec<(String, String)>>::from_query(query)
            .map(|pairs| {
                pairs
                    .into_inner()
                    .into_iter()
                    .filter(|(key, _)| key == "page")
                    .map(|(_, value)| value)
                    .last()
            })
            .unwrap_or_default();
        Self { page }
    }

    pub fn requested(&self) -> Option<&str> {
        self.page.as_deref()
    }
}

impl FromRequest for PageQuery {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_query_string(req.query_string())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

/// Resolved slice of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    /// Number of pages; an empty listing still has one (empty) page.
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Map a raw `page` parameter onto a valid page.
    pub fn window(&self, requested: Option<&str>) -> PageWindow {
        let number = requested
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, self.num_pages());

        PageWindow {
            number,
            limit: self.per_page,
            offset: (number - 1) * self.per_page,
        }
    }

    pub fn page<T>(&self, window: PageWindow, object_list: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        let has_next = window.number < num_pages;
        let has_previous = window.number > 1;
        let (start_index, end_index) = if object_list.is_empty() {
            (0, 0)
        } else {
            (
                window.offset + 1,
                window.offset + object_list.len() as i64,
            )
        };

        Page {
            object_list,
            number: window.number,
            num_pages,
            count: self.count,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(window.number + 1),
            previous_page_number: has_previous.then_some(window.number - 1),
            start_index,
            end_index,
        }
    }
}

/// One page of a listing plus navigation metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
    /// 1-based index of the first item on this page (0 when empty)
    pub start_index: i64,
    pub end_index: i64,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }
}

/// Count, clamp and fetch one page of `POSTS_PER_PAGE` items.
pub async fn paginate<T, E, F, Fut>(
    count: i64,
    requested: Option<&str>,
    fetch: F,
) -> Result<Page<T>, E>
where
    F: FnOnce(i64, i64) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let paginator = Paginator::new(count, POSTS_PER_PAGE);
    let window = paginator.window(requested);
    let items = fetch(window.limit, window.offset).await?;
    Ok(paginator.page(window, items))
}
