use std::collections::HashSet;

use log::{debug, info};

use super::{Dimension, MetricDescriptor, ResourceId, Result, Session};

/// Metrics of the catalog that are scoped to `resource`.
///
/// An entry matches when one of its dimensions is exactly the session's
/// identifying dimension with the resource id as value. Anything else is
/// dropped. Statistics are fetched by the identifying dimension alone, so
/// entries that differ only in extra dimensions collapse into the first one.
/// Fails only when the catalog itself cannot be fetched.
pub async fn resolve(session: &Session, resource: &ResourceId) -> Result<Vec<MetricDescriptor>> {
    let dimension_name = &session.settings().identifying_dimension;
    let catalog = session.catalog().await?;

    let mut seen = HashSet::new();
    let matching: Vec<MetricDescriptor> = catalog
        .iter()
        .filter(|m| m.has_dimension(dimension_name, resource.as_str()))
        .filter(|m| seen.insert(m.metric_name.clone()))
        .cloned()
        .collect();

    debug!(
        "{} of {} catalog entries match {}={}",
        matching.len(),
        catalog.len(),
        dimension_name,
        resource
    );
    info!("Resolved {} metrics for {}", matching.len(), resource);
    Ok(matching)
}

/// The dimension a matching descriptor was selected by.
pub fn identifying_dimension(session: &Session, resource: &ResourceId) -> Dimension {
    Dimension::new(
        session.settings().identifying_dimension.clone(),
        resource.as_str(),
    )
}
