pub mod cache;
pub mod connectors;
pub mod discovery;
pub mod error;
pub mod fetchers;
pub mod retry;
pub mod sections;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cache::{
    CacheKey, CacheStorage, CacheStore, Clock, FixedClock, FsStorage, MemoryStorage, SystemClock,
};
pub use connectors::{
    DeepSignalsConnector, PrimaryConnector, PrimaryParams, ProfessionalConnector,
    ProfessionalParams, SourceConnector, WebsiteConnector, WebsiteParams,
};
pub use error::{CacheError, Result};
pub use fetchers::{
    BrowserlessPageFetcher, DirectPageFetcher, GithubApi, PageFetcher, ProfessionalNetworkApi,
};
pub use retry::RetryPolicy;
