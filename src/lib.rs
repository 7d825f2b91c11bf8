pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod id;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::dispatch::Dispatcher;
use gateway::fanout::EventBus;
use gateway::registry::RoomRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub bus: EventBus,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let bus = EventBus::new();
        Self {
            config: Arc::new(config),
            registry: Arc::new(RoomRegistry::new()),
            dispatcher: Dispatcher::new(bus.clone()),
            bus,
        }
    }
}
