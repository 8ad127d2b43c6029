//! Trait and operations for address <-> coordinate lookups.

use super::distance::{DistanceUnit, geodesic_distance};
use crate::error::LocatorError;
use crate::guard::OrLog;
use anyhow::Result;
use serde::Serialize;
use tracing::error;

/// A geocoded location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

impl Place {
    pub fn point(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Abstraction over a geocoding provider (e.g., Nominatim).
///
/// `Ok(None)` means the provider answered but found nothing.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Place>>;

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Place>>;
}

/// Geocoding and distance operations on top of any [`Geocoder`].
pub struct MapApi<G> {
    geocoder: G,
}

impl<G: Geocoder> MapApi<G> {
    pub fn new(geocoder: G) -> Self {
        Self { geocoder }
    }

    /// Coordinates for `address`, or `None` when it is empty or unknown.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_geocode_data(&self, address: &str) -> Option<Place> {
        if address.trim().is_empty() {
            error!("{}", LocatorError::EmptyInput("address"));
            return None;
        }

        let place = self.geocoder.geocode(address).await.or_log("get_geocode_data")?;
        if place.is_none() {
            error!("Geocode data not found for address: {address}");
        }
        place
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_reverse_geocode_data(&self, latitude: f64, longitude: f64) -> Option<Place> {
        let place = self
            .geocoder
            .reverse(latitude, longitude)
            .await
            .or_log("get_reverse_geocode_data")?;
        if place.is_none() {
            error!(
                "Reverse geocode data not found for latitude: {latitude} and longitude: {longitude}"
            );
        }
        place
    }

    /// Geodesic distance between two addresses in `measure_units`
    /// (`"km"` or `"m"`).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_distance(
        &self,
        origin: &str,
        destination: &str,
        measure_units: &str,
    ) -> Option<f64> {
        let unit = measure_units.parse::<DistanceUnit>().or_log("get_distance")?;

        let Some(origin_data) = self.get_geocode_data(origin).await else {
            error!("Failed to get geocode data for origin: {origin}");
            return None;
        };

        let Some(destination_data) = self.get_geocode_data(destination).await else {
            error!("Failed to get geocode data for destination: {destination}");
            return None;
        };

        let meters = geodesic_distance(origin_data.point(), destination_data.point());
        Some(unit.from_meters(meters))
    }
}
