#![forbid(unsafe_code)]

//! Core domain model and game logic for Critical Case.
//!
//! This crate provides:
//! - Domain types (treatments, cases, session vocabulary, scores)
//! - The case catalog, handbook and probability generator
//! - The protocol engine
//! - Collaborators for the leaderboard and post-game feedback
//! - Player profile persistence, configuration and logging

pub mod types;
pub mod error;
pub mod rng;
pub mod catalog;
pub mod probability;
pub mod handbook;
pub mod notify;
pub mod config;
pub mod logging;
pub mod engine;
pub mod leaderboard;
pub mod feedback;
pub mod state;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::{Config, GameConfig};
pub use engine::{DatabaseRow, GameEngine, GameSession, TreatmentOutcome};
pub use feedback::{feedback_or_fallback, CommandFeedback, FeedbackProvider, FeedbackRequest};
pub use leaderboard::{JsonlLeaderboard, Leaderboard, MemoryLeaderboard};
pub use notify::{Notification, NotificationKind, NotificationQueue};
pub use rng::GameRng;
pub use state::PlayerProfile;
