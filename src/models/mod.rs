//! Core data models for the video hub.
//!
//! Comments map to the `comments` table via `sqlx::FromRow`; everything
//! serializes as JSON via `serde`.

pub mod comment;
pub mod sentiment;
pub mod video;
