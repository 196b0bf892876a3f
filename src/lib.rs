//! # Sprint Board
//!
//! Evidence-driven review board. Testers upload evidence files (screen
//! recordings, PDFs, spreadsheets, screenshots); a multimodal model turns
//! each file into a task, which then moves through five review stages.
//!
//! ## Flow
//! 1. Validate the upload (type, size, non-empty)
//! 2. Store the file (Google Drive, or memory in dev mode)
//! 3. Ask the model for a title, summary and category-specific fields
//! 4. Append the task to the task store (Google Sheets, or memory)
//!
//! Done tasks feed the generated artifacts: TestRail-style test cases, a
//! requirement document and a weekly scrum email.
//!
//! ## Modules
//! - `task`: task, status workflow and evidence types
//! - `store` / `storage`: task rows and evidence files
//! - `analyzer`: per-category evidence analysis
//! - `output`: artifact generation and CSV export
//! - `api`: HTTP surface

pub mod analyzer;
pub mod api;
pub mod assistant;
pub mod config;
pub mod google;
pub mod llm;
pub mod output;
pub mod storage;
pub mod store;
pub mod task;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use tracker::Tracker;
