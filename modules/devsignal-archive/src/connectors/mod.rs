// One connector per data source. Every connector goes through the cache
// store, so a fetch inside TTL never touches the network.

mod deep_signals;
mod primary;
mod professional;
mod website;

pub use deep_signals::{summarize_signals, DeepSignalsConnector};
pub use primary::{PrimaryConnector, PrimaryParams};
pub use professional::{ProfessionalConnector, ProfessionalParams};
pub use website::{WebsiteConnector, WebsiteParams};

use async_trait::async_trait;
use devsignal_common::{FetchError, Identity, RawResult, SourceTag};

#[async_trait]
pub trait SourceConnector: Send + Sync {
    type Params: Send + Sync;

    fn source(&self) -> SourceTag;

    async fn fetch(&self, identity: &Identity, params: &Self::Params)
        -> Result<RawResult, FetchError>;
}
