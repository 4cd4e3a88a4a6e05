use std::collections::BTreeMap;
use std::fmt;

use devsignal_common::{Identity, SourceTag};
use sha2::{Digest, Sha256};

/// Identifies one cache entry: who, which source, and the parameters that
/// shaped the fetch. Parameters are kept sorted so insertion order never
/// changes the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    identity: Identity,
    source: SourceTag,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(identity: &Identity, source: SourceTag) -> Self {
        Self {
            identity: identity.clone(),
            source,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn source(&self) -> SourceTag {
        self.source
    }

    /// SHA-256 hex over `identity \0 source \0 name=value \0 ...`.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.identity.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.source.as_str().as_bytes());
        for (name, value) in &self.params {
            hasher.update([0u8]);
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.identity, self.source)?;
        for (name, value) in &self.params {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}
