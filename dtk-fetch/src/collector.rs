//! Paginated collection over a rate-limited upstream
//!
//! **Algorithm:**
//! 1. Probe with `offset=0, limit=1` to learn `total`
//! 2. `total == 0` → empty result, no further calls
//! 3. Offsets `0, page_size, 2*page_size, ...` below `total`
//! 4. Fetch pages concurrently, at most `concurrency` in flight
//! 5. Wait for every page to finish, then reorder by ascending offset
//! 6. Any failed page fails the whole collection (lowest offset reported);
//!    partial results are discarded
//!
//! Every page must report the same `total` as the probe.

use crate::error::{CollectError, FetchError};
use async_trait::async_trait;
use dtk_common::config::FetchConfig;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;

/// One page request
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    pub params: BTreeMap<String, String>,
}

/// One page of results together with the upstream-reported total
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse<R> {
    pub total: usize,
    pub records: Vec<R>,
}

/// Fetch primitive for one page; adapters map endpoint-specific field names
#[async_trait]
pub trait PageSource: Send + Sync {
    type Record: Send;

    async fn fetch_page(&self, request: PageRequest)
        -> Result<PageResponse<Self::Record>, FetchError>;
}

/// Collects every record of a paginated result set
#[derive(Debug, Clone)]
pub struct PaginatedCollector {
    concurrency: usize,
    max_records: Option<usize>,
}

impl Default for PaginatedCollector {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl PaginatedCollector {
    /// `concurrency` bounds in-flight page fetches (minimum 1)
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            max_records: None,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        let collector = match config.concurrency {
            Some(n) => Self::new(n),
            None => Self::default(),
        };
        collector.with_max_records(config.max_records)
    }

    /// Stop after the first `max_records` records of the result set
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn collect_all<S>(
        &self,
        source: &S,
        page_size: usize,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<S::Record>, CollectError>
    where
        S: PageSource + ?Sized,
    {
        if page_size == 0 {
            return Err(CollectError::InvalidPageSize);
        }

        let probe = source
            .fetch_page(PageRequest {
                offset: 0,
                limit: 1,
                params: params.clone(),
            })
            .await
            .map_err(|source| CollectError::ProbeFailed { source })?;

        let upstream_total = probe.total;
        let total = match self.max_records {
            Some(max) => upstream_total.min(max),
            None => upstream_total,
        };

        if total == 0 {
            tracing::debug!("Paginated source reported no records");
            return Ok(Vec::new());
        }

        let offsets: Vec<usize> = (0..total).step_by(page_size).collect();
        tracing::info!(
            upstream_total,
            total,
            page_size,
            pages = offsets.len(),
            concurrency = self.concurrency,
            "Collecting paginated result set"
        );

        let fetches: Vec<_> = offsets
            .into_iter()
            .map(|offset| {
                fetch_page_at(
                    source,
                    PageRequest {
                        offset,
                        limit: page_size.min(total - offset),
                        params: params.clone(),
                    },
                )
            })
            .collect();

        let mut pages: Vec<(usize, Result<PageResponse<S::Record>, FetchError>)> =
            stream::iter(fetches)
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        // Completion order is arbitrary; consumers rely on upstream order
        pages.sort_by_key(|(offset, _)| *offset);

        let mut records = Vec::with_capacity(total);
        for (offset, result) in pages {
            let page = result.map_err(|source| {
                tracing::error!(offset, error = %source, "Page fetch failed, discarding collection");
                CollectError::PageFailed { offset, source }
            })?;

            if page.total != upstream_total {
                return Err(CollectError::InconsistentTotal {
                    offset,
                    expected: upstream_total,
                    actual: page.total,
                });
            }
            records.extend(page.records);
        }

        if records.len() != total {
            return Err(CollectError::RecordCountMismatch {
                expected: total,
                received: records.len(),
            });
        }

        Ok(records)
    }
}

async fn fetch_page_at<S>(
    source: &S,
    request: PageRequest,
) -> (usize, Result<PageResponse<S::Record>, FetchError>)
where
    S: PageSource + ?Sized,
{
    let offset = request.offset;
    tracing::debug!(offset, limit = request.limit, "Fetching page");
    (offset, source.fetch_page(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSource {
        total: usize,
    }

    #[async_trait]
    impl PageSource for CountingSource {
        type Record = usize;

        async fn fetch_page(&self, request: PageRequest) -> Result<PageResponse<usize>, FetchError> {
            let end = (request.offset + request.limit).min(self.total);
            Ok(PageResponse {
                total: self.total,
                records: (request.offset..end).collect(),
            })
        }
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let collector = PaginatedCollector::new(2);
        let err = collector
            .collect_all(&CountingSource { total: 10 }, 0, &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::InvalidPageSize));
    }

    #[tokio::test]
    async fn test_exact_boundary() {
        let collector = PaginatedCollector::new(3);
        let records = collector
            .collect_all(&CountingSource { total: 200 }, 100, &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(records, (0..200).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_max_records_caps_collection() {
        let collector = PaginatedCollector::new(4).with_max_records(150);
        let records = collector
            .collect_all(&CountingSource { total: 1000 }, 100, &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(records.len(), 150);
        assert_eq!(records.last(), Some(&149));
    }

    #[test]
    fn test_concurrency_floor() {
        assert_eq!(PaginatedCollector::new(0).concurrency(), 1);
        assert!(PaginatedCollector::default().concurrency() >= 1);
    }
}
