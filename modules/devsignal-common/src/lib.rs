pub mod aggregate;
pub mod config;
pub mod error;
pub mod score;
pub mod types;

pub use aggregate::*;
pub use config::{Config, Credentials};
pub use error::{FailureCategory, FetchError, InvalidIdentity};
pub use score::*;
pub use types::*;
