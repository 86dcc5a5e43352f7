use std::sync::Arc;

use crate::auth::SessionRegistry;
use crate::client::PortalApi;
use crate::services::database::DatabaseService;
use crate::services::publisher::FormPublisher;
use crate::services::puller::SubmissionPuller;

pub mod forms;
pub mod health;
pub mod submissions;
pub mod sync;
pub mod webhook;

// AppState struct containing shared resources
pub struct AppState {
    pub database: Arc<DatabaseService>,
    pub publisher: FormPublisher,
    pub puller: SubmissionPuller,
    pub webhook_secret: Option<String>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(
        database: Arc<DatabaseService>,
        portal: Arc<dyn PortalApi>,
        webhook_secret: Option<String>,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            publisher: FormPublisher::new(Arc::clone(&portal)),
            puller: SubmissionPuller::new(Arc::clone(&database), portal),
            database,
            webhook_secret,
            sessions,
        }
    }
}
