//! User interface components
//!
//! This module provides terminal output for playmidi, including:
//! - Carriage-return progress lines (`\r<time>`)
//! - An optional progress bar
//!
//! The bar is built using the indicatif library.

mod progress;

pub use progress::{create_playback_progress, BarProgress, LineProgress, ProgressReporter};
