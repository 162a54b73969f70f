use std::sync::Arc;

use mixdown_core::{
    CompositionEngine, Config, Janitor, ResourceMonitor, SanitizedConfig, StageRunner,
};

/// Shared application state
pub struct AppState<R: StageRunner + 'static> {
    config: Config,
    engine: Arc<CompositionEngine<R>>,
    monitor: Arc<ResourceMonitor>,
    janitor: Arc<Janitor>,
}

impl<R: StageRunner + 'static> AppState<R> {
    pub fn new(
        config: Config,
        engine: Arc<CompositionEngine<R>>,
        monitor: Arc<ResourceMonitor>,
        janitor: Arc<Janitor>,
    ) -> Self {
        Self {
            config,
            engine,
            monitor,
            janitor,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &CompositionEngine<R> {
        &self.engine
    }

    pub fn monitor(&self) -> &ResourceMonitor {
        &self.monitor
    }

    pub fn janitor(&self) -> &Janitor {
        &self.janitor
    }
}
