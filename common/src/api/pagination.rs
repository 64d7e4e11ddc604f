use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;

const DEFAULT_PER_PAGE: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    pub fn per_page(&self) -> u64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn skip(&self) -> u64 {
        self.page.unwrap_or(1).max(1).saturating_sub(1) * self.per_page()
    }

    pub fn limit(&self) -> i64 {
        self.per_page() as i64
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub result: Vec<T>,
    #[serde(rename = "totalDocuments")]
    pub total_documents: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_one_based_and_clamped() {
        let params = PaginationParams {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(params.skip(), 20);
        assert_eq!(params.limit(), 10);

        let params = PaginationParams {
            page: Some(0),
            per_page: Some(100_000),
        };
        assert_eq!(params.skip(), 0);
        assert_eq!(params.limit(), MAX_PAGE_SIZE as i64);
    }
}
