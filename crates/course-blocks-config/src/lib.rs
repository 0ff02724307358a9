// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Configuration plumbing for course-blocks hosts.
//!
//! [`ConfigStore`] is the storage port, [`ConfigService`] the JSON layer on
//! top of it and [`FsConfigStore`] the filesystem adapter. Manager settings
//! live under the [`MANAGER_SETTINGS_KEY`] key; missing keys fall back to
//! [`ManagerSettings::default`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

/// Config port and JSON service.
pub mod config;
/// Filesystem adapter.
pub mod fs;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use fs::FsConfigStore;

use course_blocks::ManagerSettings;
use tracing::debug;

/// Key under which manager settings are stored.
pub const MANAGER_SETTINGS_KEY: &str = "block_structure";

/// Loads manager settings, defaulting when none are stored.
///
/// Fields missing from a stored document take their defaults too.
pub fn load_manager_settings<S>(service: &ConfigService<S>) -> Result<ManagerSettings, ConfigError>
where
    S: ConfigStore,
{
    let settings = service.load::<ManagerSettings>(MANAGER_SETTINGS_KEY)?;
    if settings.is_none() {
        debug!(key = MANAGER_SETTINGS_KEY, "no stored manager settings; using defaults");
    }
    Ok(settings.unwrap_or_default())
}

/// Persists manager settings.
pub fn save_manager_settings<S>(
    service: &ConfigService<S>,
    settings: &ManagerSettings,
) -> Result<(), ConfigError>
where
    S: ConfigStore,
{
    service.save(MANAGER_SETTINGS_KEY, settings)
}
