// Configuration Source Port

use crate::config::{PredictionConfig, RefreshConfig};
use std::sync::{Arc, PoisonError, RwLock};

/// Hands out immutable configuration snapshots.
///
/// Callers take one snapshot per operation; a reload only affects
/// operations started afterwards.
pub trait ConfigSource: Send + Sync {
    fn refresh_config(&self) -> Arc<RefreshConfig>;

    fn prediction_config(&self) -> Arc<PredictionConfig>;
}

/// Snapshot that can be swapped at runtime (hot reload)
pub struct ReloadableConfigSource {
    refresh: RwLock<Arc<RefreshConfig>>,
    prediction: RwLock<Arc<PredictionConfig>>,
}

impl ReloadableConfigSource {
    pub fn new(refresh: RefreshConfig, prediction: PredictionConfig) -> Self {
        Self {
            refresh: RwLock::new(Arc::new(refresh)),
            prediction: RwLock::new(Arc::new(prediction)),
        }
    }

    pub fn replace(&self, refresh: RefreshConfig, prediction: PredictionConfig) {
        *self.refresh.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(refresh);
        *self
            .prediction
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(prediction);
    }
}

impl Default for ReloadableConfigSource {
    fn default() -> Self {
        Self::new(RefreshConfig::default(), PredictionConfig::default())
    }
}

impl ConfigSource for ReloadableConfigSource {
    fn refresh_config(&self) -> Arc<RefreshConfig> {
        self.refresh
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn prediction_config(&self) -> Arc<PredictionConfig> {
        self.prediction
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
