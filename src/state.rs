use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::email::Mailer;
use crate::services::instagram::MediaSource;
use crate::services::payments::PaymentProvider;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub payments: Box<dyn PaymentProvider>,
    pub mailer: Box<dyn Mailer>,
    pub media: Box<dyn MediaSource>,
}

impl AppState {
    /// Locks the shared connection. Every multi-statement unit of work runs
    /// while this guard is held.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database mutex poisoned")))
    }
}
