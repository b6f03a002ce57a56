//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler.

use crate::config::Config;
use activity_planner_core::{ActivityRepository, PdfTextExtractor, ProviderCoordinator};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Nothing in here is request-specific; vendor keys travel with each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coordinator: Arc<ProviderCoordinator>,
    pub activities: Arc<dyn ActivityRepository>,
    pub pdf_extractor: Arc<dyn PdfTextExtractor>,
}
