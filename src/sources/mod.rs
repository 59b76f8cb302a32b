//! Data sources for aggregation
//!
//! Each source implements the `Source` trait for unified searching.

pub mod generic;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schemas::{AggregatedResponse, AuthType};

pub use generic::GenericApiSource;

pub const DEFAULT_COUNT: u32 = 5;
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_SORT_BY: &str = "publishedAt";

/// Metadata about a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Configured service name
    pub name: String,
    /// Base URL requests are sent to
    pub base_url: String,
    /// Authentication mode
    pub auth_type: AuthType,
    /// Bound post-processor, if any
    pub post_processor: Option<String>,
}

/// Parameters of a keyword search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    /// Page size
    pub count: u32,
    /// 1-based page number
    pub page: u32,
    pub sort_by: String,
    /// Defaults to today (UTC) when expanded into a URL
    pub from_date: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            count: DEFAULT_COUNT,
            page: DEFAULT_PAGE,
            sort_by: DEFAULT_SORT_BY.to_string(),
            from_date: None,
        }
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = sort_by.into();
        self
    }

    pub fn from_date(mut self, from_date: NaiveDate) -> Self {
        self.from_date = Some(from_date);
        self
    }

    /// Zero-based item offset of the requested page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.count)
    }
}

/// Trait for all searchable sources
#[async_trait]
pub trait Source: Send + Sync {
    /// Gets metadata about this source
    fn metadata(&self) -> &SourceMetadata;

    /// Searches the source. Failures are reported inside the response, never as errors.
    async fn fetch(&self, query: &SearchQuery) -> AggregatedResponse;

    /// Gets the source name
    fn name(&self) -> &str {
        &self.metadata().name
    }
}
