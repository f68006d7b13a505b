//! Process-wide application context
//!
//! Built once at startup and handed to commands as Tauri state: the immutable
//! workout catalog, the deployment's candidate filter mode, and the bounded
//! playlist cache. External API clients are constructed per command from the
//! environment; they hold no cross-request state besides this context.

use crate::catalog::{CatalogError, FilterMode, WorkoutCatalog};
use crate::playlist::PlaylistCache;
use std::sync::Mutex;

const PLAYLIST_CACHE_CAPACITY: usize = 32;

pub struct AppContext {
  pub catalog: WorkoutCatalog,
  pub filter_mode: FilterMode,
  pub playlist_cache: Mutex<PlaylistCache>,
}

impl AppContext {
  /// Load the catalog and read the filter mode from the environment
  pub fn initialize() -> Result<Self, CatalogError> {
    Ok(Self::new(WorkoutCatalog::load_default()?, FilterMode::from_env()))
  }

  pub fn new(catalog: WorkoutCatalog, filter_mode: FilterMode) -> Self {
    Self {
      catalog,
      filter_mode,
      playlist_cache: Mutex::new(PlaylistCache::new(PLAYLIST_CACHE_CAPACITY)),
    }
  }
}
