//! Translarr - Media Library Subtitle Translation
//!
//! Indexes a `series/season/episode` media library, extracts the best
//! embedded subtitle stream of each wanted episode with ffmpeg, translates
//! it through the Gemini API and writes a companion subtitle file next to
//! the video.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod library;
pub mod media;
pub mod models;
pub mod settings;
pub mod store;
pub mod subtitle;
pub mod translate;
pub mod usage;
pub mod workflow;
