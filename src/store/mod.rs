//! In-process data stores.
//!
//! Both stores keep their tables behind `Arc<RwLock<_>>`; handles are cheap
//! to clone and every clone sees the same data. State does not survive a
//! restart.

pub mod content;
pub mod users;

use thiserror::Error;

use crate::error::AppError;

pub use content::ContentStore;
pub use users::{NewUser, User, UserStore};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("unknown language '{0}'")]
    UnknownLanguage(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            StoreError::Duplicate(what) => AppError::Conflict(format!("{what} already exists")),
            StoreError::UnknownLanguage(code) => {
                AppError::field("lang_code", format!("Unknown language '{code}'"))
            }
        }
    }
}
