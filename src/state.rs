use std::sync::Arc;

use crate::engine::SettlementEngine;
use crate::store::SettlementStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub store: Arc<dyn SettlementStore>,
}
