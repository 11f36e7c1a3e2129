use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::mail::Mailer;
use crate::store::{TaskStore, TeamStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub teams: Arc<dyn TeamStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
    pub started_at: Instant,
}
