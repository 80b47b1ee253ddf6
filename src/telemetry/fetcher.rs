use log::{debug, trace};

use super::{
    Dimension, MetricDescriptor, Observation, Result, Session, StatisticKind, StatisticRequest,
    TelemetryError, TimeWindow,
};

/// Issues one provider call per (metric, dimension, statistic).
pub struct Fetcher<'a> {
    session: &'a Session,
}

impl<'a> Fetcher<'a> {
    pub fn new(session: &'a Session) -> Self {
        Fetcher { session }
    }

    /// Raw observations for one statistic, in the order the provider sent them.
    ///
    /// `NoData` from the provider comes back as an empty vector. Datapoints
    /// that do not carry the requested statistic are skipped.
    pub async fn fetch(
        &self,
        descriptor: &MetricDescriptor,
        dimension: &Dimension,
        statistic: StatisticKind,
        window: TimeWindow,
    ) -> Result<Vec<Observation>> {
        let request = StatisticRequest {
            namespace: descriptor.namespace.clone(),
            metric_name: descriptor.metric_name.clone(),
            dimensions: vec![dimension.clone()],
            statistic,
            window,
            period_secs: self.session.settings().period_secs,
        };

        let datapoints = match self.session.provider().get_statistic(&request).await {
            Ok(dps) => dps,
            Err(TelemetryError::NoData(what)) => {
                debug!("No data for {}", what);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let total = datapoints.len();
        let observations: Vec<Observation> = datapoints
            .into_iter()
            .filter_map(|dp| {
                statistic
                    .extract(&dp)
                    .map(|value| Observation::new(dp.timestamp, value, dp.unit))
            })
            .collect();

        trace!(
            "{}/{}: kept {} of {} datapoints",
            descriptor.metric_name,
            statistic,
            observations.len(),
            total
        );
        Ok(observations)
    }
}
