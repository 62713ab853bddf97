//! Shared application state.

use std::sync::Arc;

use cbp_jobs::Dispatcher;

use crate::catalog::CatalogClient;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// External catalog; `None` disables course-suggestion endpoints.
    pub catalog: Option<Arc<CatalogClient>>,
}
