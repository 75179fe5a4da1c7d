use std::sync::Arc;

use crate::platform::LogSource;
use crate::settings::PipelineSettings;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn LogSource>,
    pub pipeline: PipelineSettings,
}
