//! HTTP API for the review board.
//!
//! ## Endpoints
//! - `GET /api/health` - health check (public)
//! - `POST /api/auth/login` - exchange the dashboard password for a JWT (public)
//! - `GET /api/stats` - counts per status and category
//! - `GET /api/board` - tasks grouped into the five workflow columns
//! - `GET /api/tasks` - list tasks (`status`, `category`, `q` filters)
//! - `POST /api/tasks/upload` - submit an evidence file
//! - `GET /api/tasks/export` - all tasks as CSV
//! - `GET /api/tasks/:id` - one task
//! - `POST /api/tasks/:id/status` - move a task to another status
//! - `POST /api/outputs/{test-cases,requirements,scrum-email}` - generated artifacts
//! - `POST /api/chat` - ask the board assistant

mod auth;
mod chat;
mod errors;
mod outputs;
mod routes;
mod tasks;
pub mod types;

pub use auth::hash_password;
pub use routes::{router, serve, AppState};
