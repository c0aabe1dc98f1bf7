//! Upstream data access for datatalker
//!
//! - [`fetcher::RemoteFetcher`]: single HTTP call with bounded retry/backoff
//!   on transient network faults
//! - [`collector::PaginatedCollector`]: probe + concurrent page fetch with
//!   ordered reassembly
//! - [`json_page::JsonPageSource`]: adapter mapping a JSON endpoint onto pages
//! - [`ogd`] / [`ckan`]: catalog APIs built on the above

pub mod ckan;
pub mod collector;
pub mod error;
pub mod fetcher;
pub mod json_page;
pub mod ogd;
pub mod retry;
pub mod transport;

pub use collector::{PageRequest, PageResponse, PageSource, PaginatedCollector};
pub use error::{CollectError, FetchError};
pub use fetcher::RemoteFetcher;
pub use json_page::JsonPageSource;
pub use retry::RetryPolicy;
pub use transport::{FetchRequest, FetchResponse, HttpTransport, ReqwestTransport, TransportError};
