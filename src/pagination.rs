use serde::Serialize;

pub const PAGE_SIZE: i64 = 20;

/// Paginated result set shared by resource and job listings.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub page_size: i64,
    pub items: Vec<T>,
}

/// Non-numeric or sub-1 page numbers coerce to page 1.
pub fn coerce_page(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

pub fn total_pages(total_items: i64) -> i64 {
    (total_items + PAGE_SIZE - 1) / PAGE_SIZE
}

/// Pages beyond the last clamp to the last page; an empty result set pins to 1.
pub fn clamp_page(page: i64, total_pages: i64) -> i64 {
    if total_pages == 0 {
        1
    } else if page > total_pages {
        total_pages
    } else {
        page
    }
}

pub fn offset(page: i64) -> i64 {
    (page - 1) * PAGE_SIZE
}
