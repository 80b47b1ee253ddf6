use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{MetricDescriptor, Result};
use crate::provider::MetricsProvider;
use crate::Settings;

/// Provider-facing settings shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub namespace: String,
    /// Dimension that names the resource, e.g. `DBInstanceIdentifier`.
    pub identifying_dimension: String,
    pub period_secs: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            namespace: String::from(Settings::NAMESPACE),
            identifying_dimension: String::from(Settings::IDENTIFYING_DIMENSION),
            period_secs: Settings::PERIOD_SECS,
        }
    }
}

/// Per-run context handed to each stage.
///
/// Provider answers that several stages need (the metric catalog) are cached
/// here and die with the session.
pub struct Session {
    provider: Arc<dyn MetricsProvider>,
    settings: ProviderSettings,
    catalog: OnceCell<Vec<MetricDescriptor>>,
}

impl Session {
    pub fn new(provider: Arc<dyn MetricsProvider>, settings: ProviderSettings) -> Self {
        Session {
            provider,
            settings,
            catalog: OnceCell::new(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn MetricsProvider> {
        &self.provider
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Full catalog for the configured namespace, fetched at most once.
    pub async fn catalog(&self) -> Result<&[MetricDescriptor]> {
        let catalog = self
            .catalog
            .get_or_try_init(|| self.provider.list_available_metrics(&self.settings.namespace))
            .await?;
        Ok(catalog.as_slice())
    }
}
