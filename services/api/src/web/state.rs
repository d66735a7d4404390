//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::ids::TimetableIdCodec;
use std::sync::Arc;
use timetable_core::{DatabaseService, TimetableEngine};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TimetableEngine>,
    /// Used directly only to validate auth sessions.
    pub db: Arc<dyn DatabaseService>,
    pub ids: Arc<TimetableIdCodec>,
}
