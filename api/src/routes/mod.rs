pub mod ai;
pub mod albums;
pub mod analytics;
pub mod favorites;
pub mod friends;
pub mod playlists;
pub mod songs;
pub mod users;

use serde::Deserialize;

use crate::db::Page;
use crate::responses::Pagination;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// `?page=&limit=`, 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn window(&self) -> Page {
        let limit = self.limit() as i64;
        Page {
            limit,
            offset: (self.page() as i64 - 1) * limit,
        }
    }

    pub fn pagination(&self, total: i64) -> Pagination {
        Pagination {
            page: self.page(),
            limit: self.limit(),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_twenty() {
        let query = PageQuery::default();
        assert_eq!(query.window(), Page { limit: 20, offset: 0 });
    }

    #[test]
    fn page_three_skips_two_pages() {
        let query = PageQuery {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(query.window(), Page { limit: 10, offset: 20 });
        let p = query.pagination(42);
        assert_eq!((p.page, p.limit, p.total), (3, 10, 42));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let query = PageQuery {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(query.window(), Page { limit: 100, offset: 0 });
        let zero = PageQuery {
            page: None,
            limit: Some(0),
        };
        assert_eq!(zero.limit(), 1);
    }
}
