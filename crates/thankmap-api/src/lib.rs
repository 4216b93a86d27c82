pub mod error;
pub mod health;
pub mod share;

use std::sync::Arc;

use thankmap_db::Database;
use thankmap_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
}
