use super::geocoder::{Geocoder, Place};
use crate::fetch::layers::StaticHeader;
use crate::fetch::{HttpClient, fetch_json};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

/// Nominatim's usage policy requires an identifying user agent.
pub const USER_AGENT_NAME: &str = "LocationListener";

#[derive(Debug, Deserialize)]
struct RawPlace {
    lat: String,
    lon: String,
    display_name: String,
}

impl TryFrom<RawPlace> for Place {
    type Error = anyhow::Error;

    fn try_from(raw: RawPlace) -> Result<Self> {
        Ok(Place {
            latitude: raw.lat.parse().context("invalid latitude")?,
            longitude: raw.lon.parse().context("invalid longitude")?,
            address: raw.display_name,
        })
    }
}

/// `/reverse` answers `{"error": "Unable to geocode"}` when nothing is there.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseResponse {
    Found(RawPlace),
    Failed { error: String },
}

/// [`Geocoder`] backed by the OpenStreetMap Nominatim API.
pub struct NominatimClient<C> {
    http: StaticHeader<C>,
    base_url: String,
}

impl<C: HttpClient> NominatimClient<C> {
    pub fn new(client: C, base_url: &str) -> Result<Self> {
        Ok(Self {
            http: StaticHeader::user_agent(client, USER_AGENT_NAME)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/{}", self.base_url, path),
            params,
        )?)
    }
}

#[async_trait]
impl<C: HttpClient> Geocoder for NominatimClient<C> {
    async fn geocode(&self, address: &str) -> Result<Option<Place>> {
        let url = self.endpoint(
            "search",
            &[("q", address), ("format", "json"), ("limit", "1")],
        )?;
        let places: Vec<RawPlace> = fetch_json(&self.http, url).await?;
        debug!(matches = places.len(), "Nominatim search answered");

        places.into_iter().next().map(Place::try_from).transpose()
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Place>> {
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let url = self.endpoint(
            "reverse",
            &[("lat", lat.as_str()), ("lon", lon.as_str()), ("format", "json")],
        )?;

        match fetch_json::<ReverseResponse, _>(&self.http, url).await? {
            ReverseResponse::Found(raw) => Ok(Some(raw.try_into()?)),
            ReverseResponse::Failed { error } => {
                debug!(error = %error, "Nominatim reverse found nothing");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubClient;
    use crate::geo::MapApi;

    const WARSAW: &str = r#"[{"place_id": 1, "lat": "52.2319581", "lon": "21.0067249", "display_name": "Warszawa, województwo mazowieckie, Polska"}]"#;

    fn client(stub: StubClient) -> NominatimClient<StubClient> {
        NominatimClient::new(stub, "https://nominatim.example/").unwrap()
    }

    #[tokio::test]
    async fn search_parses_first_match() {
        let nominatim = client(StubClient::new().route("/search", 200, WARSAW));

        let place = nominatim.geocode("Warszawa").await.unwrap().unwrap();

        assert_eq!(place.latitude, 52.2319581);
        assert_eq!(place.longitude, 21.0067249);
        assert!(place.address.starts_with("Warszawa"));

        let seen = nominatim.http.inner.requests();
        assert!(seen[0].url.starts_with("https://nominatim.example/search?q=Warszawa"));
        assert_eq!(seen[0].header("user-agent").as_deref(), Some(USER_AGENT_NAME));
    }

    #[tokio::test]
    async fn search_without_match_is_none() {
        let nominatim = client(StubClient::new().route("/search", 200, "[]"));
        assert!(nominatim.geocode("Atlantis").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_coordinate_is_an_error() {
        let nominatim = client(StubClient::new().route(
            "/search",
            200,
            r#"[{"lat": "north", "lon": "21.0", "display_name": "x"}]"#,
        ));
        assert!(nominatim.geocode("x").await.is_err());
    }

    #[tokio::test]
    async fn reverse_found() {
        let nominatim = client(StubClient::new().route(
            "/reverse",
            200,
            r#"{"lat": "40.7127281", "lon": "-74.0060152", "display_name": "New York, United States"}"#,
        ));

        let place = nominatim.reverse(40.7128, -74.0060).await.unwrap().unwrap();
        assert_eq!(place.address, "New York, United States");

        let seen = nominatim.http.inner.requests();
        assert!(seen[0].url.contains("lat=40.7128"));
        assert!(seen[0].url.contains("lon=-74.006"));
    }

    #[tokio::test]
    async fn reverse_in_the_ocean_is_none_through_map_api() {
        let stub = StubClient::new().route("/reverse", 200, r#"{"error": "Unable to geocode"}"#);
        let api = MapApi::new(client(stub));

        assert!(api.get_reverse_geocode_data(0.0, 0.0).await.is_none());
    }

    #[tokio::test]
    async fn distance_through_nominatim() {
        let stub = StubClient::new()
            .route("q=Warsaw", 200, WARSAW)
            .route(
                "q=Krakow",
                200,
                r#"[{"lat": "50.0619474", "lon": "19.9368564", "display_name": "Kraków, Polska"}]"#,
            );
        let api = MapApi::new(client(stub));

        let km = api.get_distance("Warsaw", "Krakow", "km").await.unwrap();
        assert!((240.0..260.0).contains(&km), "{km}");
    }
}
