//! Shared application state for Axum handlers.
//!
//! This module provides thread-safe, clonable state that is shared across
//! all request handlers and middleware layers. It includes:
//!
//! - **Session tokens**: the codec that issues and verifies bearer tokens
//! - **Admission control**: the per-client login attempt table
//! - **Stores**: in-memory users and static content
//! - **Configuration**: Runtime configuration access
//!
//! # Structured Concurrency
//!
//! The admission sweep runs as a background task managed by
//! `tokio_util::task::TaskTracker` and `CancellationToken`. Call `shutdown()`
//! to stop it before application exit.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::admission::AdmissionController;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::middleware::TrustedProxies;
use crate::password::PasswordVault;
use crate::store::{ContentStore, NewUser, User, UserStore};
use crate::token::TokenCodec;

/// Shared application state for Axum handlers.
///
/// Cloned for each request. Every component is either an `Arc` or a handle
/// over shared interior state, so clones observe the same data.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(config)?;
/// state.seed_admin().await?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Issues and verifies session tokens
    pub tokens: Arc<TokenCodec>,
    /// Login admission table
    pub admission: AdmissionController,
    /// Networks allowed to set forwarding headers
    pub trusted_proxies: TrustedProxies,
    pub users: UserStore,
    pub content: ContentStore,
    pub vault: PasswordVault,
    /// Timestamp when the application started
    pub started_at: Instant,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Validate `config`, build state from it and start the admission sweep.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> AppResult<Self> {
        config.validate()?;
        let admission = AdmissionController::new(config.login_rate_limit, config.login_rate_window)
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        let vault = PasswordVault::new(config.argon2_memory_kib, config.argon2_iterations)
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        let tokens = Arc::new(TokenCodec::new(
            config.jwt_secret.as_bytes(),
            config.jwt_expiry,
        ));
        let trusted_proxies = TrustedProxies::new(&config.trusted_proxies);

        let state = Self {
            config: Arc::new(config),
            tokens,
            admission,
            trusted_proxies,
            users: UserStore::new(),
            content: ContentStore::with_defaults(),
            vault,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_admission_sweep_task();

        Ok(state)
    }

    /// Create the configured administrator, flagged to change the password
    /// on first login. A no-op when the account already exists.
    pub async fn seed_admin(&self) -> AppResult<User> {
        if let Some(existing) = self.users.find_by_email(&self.config.admin_email).await {
            return Ok(existing);
        }

        let password_hash = self.vault.hash(&self.config.admin_password).await?;
        let user = self
            .users
            .insert(NewUser {
                name: self.config.admin_name.clone(),
                email: self.config.admin_email.clone(),
                password_hash,
                needs_password_update: true,
            })
            .await?;

        info!(user_id = user.id, email = %user.email, "Seeded administrator account");
        Ok(user)
    }

    /// Spawn the periodic admission sweep.
    ///
    /// Only the controller handle is moved into the task. A failed or empty
    /// sweep is not an error; the task keeps ticking until cancelled.
    fn spawn_admission_sweep_task(&self) {
        let admission = self.admission.clone();
        let every = self.config.admission_sweep_interval;
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased; // Check cancellation first

                    _ = cancel.cancelled() => {
                        debug!("Admission sweep task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = admission.sweep();
                        let tracked = admission.tracked_clients();
                        metrics::set_admission_tracked_clients(tracked);
                        if removed > 0 {
                            debug!(removed, tracked, "Swept expired admission records");
                        } else {
                            trace!(tracked, "Admission sweep found nothing to remove");
                        }
                    }
                }
            }

            debug!("Admission sweep task shutting down");
        });
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// Signals cancellation, closes the tracker so no new tasks can be
    /// spawned, then waits for running tasks to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
