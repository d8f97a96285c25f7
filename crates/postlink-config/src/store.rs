//! Hot-swappable holder for the active board configs.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::{BoardConfigs, ConfigError};

/// Shares one [`BoardConfigs`] snapshot with every parse.
///
/// Readers take an `Arc` snapshot and keep using it for the whole operation,
/// so a reload never changes the rules halfway through a post.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<BoardConfigs>,
}

impl ConfigStore {
    pub fn new(configs: BoardConfigs) -> Self {
        Self {
            current: ArcSwap::from_pointee(configs),
        }
    }

    pub fn snapshot(&self) -> Arc<BoardConfigs> {
        self.current.load_full()
    }

    pub fn replace(&self, configs: BoardConfigs) {
        self.current.store(Arc::new(configs));
    }

    /// Re-read the config file. A missing file resets to the defaults; a
    /// file that fails to parse leaves the current configs in place.
    pub fn reload_from_path<P: AsRef<Path>>(&self, config_path: P) -> Result<(), ConfigError> {
        let configs = BoardConfigs::load_from_path(config_path.as_ref())?.unwrap_or_default();
        log::info!("reloaded board config from {}", config_path.as_ref().display());
        self.replace(configs);
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(BoardConfigs::default())
    }
}
