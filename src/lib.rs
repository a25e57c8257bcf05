//! # Site Backend
//!
//! HTTP backend for an events and geocaching site, built with Axum. The
//! interesting part is the request gate in front of the business handlers:
//!
//! - **Session tokens**: HS256 bearer tokens carrying a fixed claim shape
//! - **Admission control**: per-client fixed-window throttling of login attempts
//! - **Conditional caching**: SHA-256 content fingerprints as `ETag`s, 304 on match
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → CORS → Admission / Auth)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (auth, content, health) + ConditionalRequest      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TokenCodec · AdmissionController · PasswordVault           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  In-memory stores (users, languages, static content)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use site_backend::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), site_backend::AppError> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     state.seed_admin().await?;
//!
//!     let app = build_router(state);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Security Configuration
//!
//! Production requires a real signing secret:
//! ```bash
//! ENV=production JWT_SECRET=$(openssl rand -hex 32) cargo run
//! ```
//!
//! Behind a reverse proxy, only trust its forwarding headers:
//! ```bash
//! TRUSTED_PROXIES=10.0.0.0/8 cargo run
//! ```

pub mod admission;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod password;
pub mod routes;
pub mod state;
pub mod store;
pub mod token;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use admission::{Admission, AdmissionController};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use fingerprint::{ConditionalRequest, Fingerprint};
pub use routes::build_router;
pub use state::AppState;
pub use token::{Identity, SessionClaims, TokenCodec, TokenError};
