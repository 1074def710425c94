use std::sync::Arc;

use sn_core::NewsStorage;
use sn_scrappers::NewsSync;

pub struct AppState {
    pub storage: Arc<dyn NewsStorage>,
    pub sync: Arc<NewsSync>,
    /// Bearer token for the admin endpoints; `None` disables them.
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(sync: Arc<NewsSync>, admin_token: Option<String>) -> Self {
        Self {
            storage: sync.storage(),
            sync,
            admin_token: admin_token.filter(|token| !token.is_empty()),
        }
    }
}
