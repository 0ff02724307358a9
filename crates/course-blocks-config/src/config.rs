// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings documents: the storage port and the JSON layer above it.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

/// Where settings documents live, addressed by a short document key.
pub trait ConfigStore {
    /// Raw bytes of the document under `key`; [`ConfigError::NotFound`]
    /// when nothing was ever saved there.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Replaces the document under `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

impl<T> ConfigStore for &T
where
    T: ConfigStore + ?Sized,
{
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        (**self).load_raw(key)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        (**self).save_raw(key, data)
    }
}

/// Failures reading or writing a settings document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No document under the requested key.
    #[error("settings document not found")]
    NotFound,
    /// The backing storage failed.
    #[error("settings storage: {0}")]
    Io(#[from] std::io::Error),
    /// The document is not valid JSON for the requested type.
    #[error("settings document is malformed: {0}")]
    Serde(#[from] serde_json::Error),
    /// The store refused the request.
    #[error("settings store: {0}")]
    Other(String),
}

/// Reads and writes typed settings as pretty-printed JSON documents.
#[derive(Debug)]
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Wraps `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Document under `key`, or `Ok(None)` when it is absent or empty.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => {
                debug!(key, "empty settings document");
                Ok(None)
            }
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Writes `value` under `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)?;
        debug!(key, bytes = data.len(), "saved settings document");
        Ok(())
    }
}
