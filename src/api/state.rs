use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::core::AppConfig;
use crate::mail::{MailSettings, Mailer, mailer_for};

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    pub mailer: Arc<dyn Mailer>,
    // Derived from `config`, kept around since every email needs it
    pub mail_settings: MailSettings,
}

// Nothing in the state changes after startup so no lock is needed
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: Connection, config: AppConfig) -> Self {
        let mailer = mailer_for(&config);
        Self::with_mailer(db, config, mailer)
    }

    pub fn with_mailer(db: Connection, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let mail_settings = MailSettings::from(&config);
        Self {
            db,
            config,
            mailer,
            mail_settings,
        }
    }
}
