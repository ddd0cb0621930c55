pub mod handlers;
pub mod router;

use std::sync::Arc;

use crate::booking::finalizer::BookingFinalizer;
use crate::booking::intent::BookingIntentStore;
use crate::db::repository::Repository;

/// Shared handler state: one repository, the session store and the
/// finalizer wired to the configured payment gateway.
pub struct AppState {
    pub repo: Arc<Repository>,
    pub intents: BookingIntentStore,
    pub finalizer: BookingFinalizer,
}
