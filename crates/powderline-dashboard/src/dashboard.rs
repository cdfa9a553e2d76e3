//! Composition of the three providers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use powderline_avalanche::AvalancheClient;
use powderline_core::{AppError, Config};
use powderline_roads::RoadEventsClient;
use powderline_weather::{Location, WeatherProvider};
use tokio::task::{JoinError, JoinSet};
use tracing::instrument;

use crate::report::{
    PowderEntry, PowderRanking, RankingFailure, Report, Section, SectionError, WeatherSummary,
};

#[derive(Debug)]
pub struct Dashboard {
    weather: Arc<WeatherProvider>,
    avalanche: AvalancheClient,
    roads: RoadEventsClient,
}

impl Dashboard {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let weather = WeatherProvider::new(&config.http, &config.weather)
            .map_err(|e| service_error("weather", e))?;
        let avalanche = AvalancheClient::new(&config.http, &config.avalanche)
            .map_err(|e| service_error("avalanche", e))?;
        let roads = RoadEventsClient::new(&config.http, &config.roads)
            .map_err(|e| service_error("roads", e))?;

        Ok(Self::from_parts(weather, avalanche, roads))
    }

    pub fn from_parts(
        weather: WeatherProvider,
        avalanche: AvalancheClient,
        roads: RoadEventsClient,
    ) -> Self {
        Self {
            weather: Arc::new(weather),
            avalanche,
            roads,
        }
    }

    /// Weather, avalanche and road conditions for `location`.
    ///
    /// The three sources are fetched concurrently and fail independently.
    #[instrument(skip(self, location), fields(location = %location.id), level = "info")]
    pub async fn report(&self, location: &Location) -> Report {
        let (weather, avalanche, roads) = tokio::join!(
            self.weather.fetch(location),
            self.avalanche.forecast_near(location.coordinates),
            self.roads
                .relevant_events(location.coordinates, &location.highways),
        );

        let weather = weather.map(|cached| cached.map(|data| WeatherSummary::from_data(&data)));

        Report {
            location: location.clone(),
            generated_at: Utc::now(),
            weather: Section::from_result("weather", weather),
            avalanche: Section::from_result("avalanche", avalanche),
            roads: Section::from_result("roads", roads),
        }
    }

    /// Rank `locations` by the powder score of their next 24 hours.
    ///
    /// Ties fall back to the best upcoming day, then to input order.
    #[instrument(skip_all, fields(count = locations.len()), level = "info")]
    pub async fn powder_ranking(&self, locations: &[Location]) -> PowderRanking {
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::with_capacity(locations.len());
        for (index, location) in locations.iter().cloned().enumerate() {
            let weather = Arc::clone(&self.weather);
            let handle = tasks.spawn(async move { weather.fetch(&location).await });
            task_index.insert(handle.id(), index);
        }

        let mut ranked: Vec<(usize, PowderEntry)> = Vec::with_capacity(locations.len());
        let mut failures: Vec<(usize, RankingFailure)> = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, Ok(result)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some((index, location)) = task_index
                .get(&id)
                .and_then(|&i| locations.get(i).map(|l| (i, l)))
            else {
                continue;
            };

            match outcome {
                Ok(Ok(cached)) => {
                    let summary = WeatherSummary::from_data(&cached.value);
                    ranked.push((
                        index,
                        PowderEntry {
                            location: location.clone(),
                            powder: summary.powder,
                            snow_past_24h_cm: summary.snow_past_24h_cm,
                            best_day: summary.best_day,
                            freshness: cached.freshness,
                        },
                    ));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Skipping {} in powder ranking: {}", location.name, e);
                    failures.push((
                        index,
                        RankingFailure {
                            location: location.clone(),
                            message: SectionError::user_message(&e),
                        },
                    ));
                }
                Err(e) => {
                    tracing::error!("Powder ranking task for {} failed: {}", location.name, e);
                    failures.push((index, task_failure(location, &e)));
                }
            }
        }

        ranked.sort_by(|(ia, a), (ib, b)| {
            b.powder
                .score
                .total_cmp(&a.powder.score)
                .then_with(|| best_score(b).total_cmp(&best_score(a)))
                .then_with(|| ia.cmp(ib))
        });
        failures.sort_by_key(|(index, _)| *index);

        PowderRanking {
            generated_at: Utc::now(),
            entries: ranked.into_iter().map(|(_, e)| e).collect(),
            failures: failures.into_iter().map(|(_, f)| f).collect(),
        }
    }
}

fn service_error(service: &'static str, error: impl std::fmt::Display) -> AppError {
    AppError::Service {
        service,
        message: error.to_string(),
    }
}

fn task_failure(location: &Location, error: &JoinError) -> RankingFailure {
    let message = if error.is_cancelled() {
        "The forecast request was cancelled."
    } else {
        "The forecast could not be processed."
    };
    RankingFailure {
        location: location.clone(),
        message: message.to_string(),
    }
}

fn best_score(entry: &PowderEntry) -> f64 {
    entry.best_day.as_ref().map_or(0.0, |d| d.powder.score)
}
