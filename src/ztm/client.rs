use super::model::{
    Envelope, LatLon, RawVehicle, Ride, ScheduleRecord, StopRef, ValueSet, VehicleRecord,
    VehicleType, ZtmVehicle,
};
use super::url::{stop_id_url, stop_lines_url, timetable_url, vehicles_url};
use crate::config::ApiSettings;
use crate::error::LocatorError;
use crate::fetch::layers::UrlParam;
use crate::fetch::{HttpClient, fetch_json};
use crate::guard::OrLog;
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Client for the Warsaw ZTM vehicle-location and timetable resources.
pub struct ZtmClient<C> {
    http: UrlParam<C>,
    bus_tram_url: String,
    stop_url: String,
    poll_interval: Duration,
}

impl<C: HttpClient> ZtmClient<C> {
    pub fn new(client: C, settings: &ApiSettings) -> Result<Self, LocatorError> {
        let key = settings
            .api_keys
            .ztm_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(LocatorError::MissingApiKey)?;

        Ok(Self {
            http: UrlParam::new(client, "apikey", key),
            bus_tram_url: settings.api_urls.ztm_bus_tram_url.clone(),
            stop_url: settings.api_urls.ztm_stop_url.clone(),
            poll_interval: settings.poll_interval(),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Polls vehicle positions for `line` `amount` times.
    ///
    /// Each successful poll contributes one batch. Failed and empty polls are
    /// logged and skipped.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_vehicles_location_data(
        &self,
        line: &str,
        vehicle_type: VehicleType,
        amount: usize,
    ) -> Vec<Vec<VehicleRecord>> {
        if line.trim().is_empty() {
            error!("{}", LocatorError::EmptyInput("line"));
            return Vec::new();
        }

        let data = self
            .poll(amount, move || async move {
                let vehicles = self.fetch_vehicles(line, vehicle_type).await?;
                Ok::<_, anyhow::Error>(non_empty(vehicles.iter().map(VehicleRecord::from).collect()))
            })
            .await;

        info!("Finished getting data for {line}");
        data
    }

    /// Polls like [`Self::get_vehicles_location_data`] but keeps only the
    /// coordinates, flattened across polls.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_lat_lon_for_vehicle(
        &self,
        line: &str,
        vehicle_type: VehicleType,
        amount: usize,
    ) -> Vec<LatLon> {
        if line.trim().is_empty() {
            error!("{}", LocatorError::EmptyInput("line"));
            return Vec::new();
        }

        let data: Vec<LatLon> = self
            .poll(amount, move || async move {
                let vehicles = self.fetch_vehicles(line, vehicle_type).await?;
                Ok::<_, anyhow::Error>(non_empty(vehicles.iter().map(LatLon::from).collect()))
            })
            .await
            .into_iter()
            .flatten()
            .collect();

        info!(points = data.len(), "Finished getting data for {line}");
        data
    }

    /// Polls the timetable of `line` at one stop post `amount` times.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_stop_schedule_data(
        &self,
        line: &str,
        stop_nr: &str,
        amount: usize,
        stop: &StopRef,
    ) -> Vec<ScheduleRecord> {
        if line.trim().is_empty() {
            error!("{}", LocatorError::EmptyInput("line"));
            return Vec::new();
        }

        let Some(stop_id) = self.resolve_stop(stop).await.or_log("get_stop_schedule_data")
        else {
            return Vec::new();
        };

        let stop_id = stop_id.as_str();
        let data = self
            .poll(amount, move || async move {
                let schedule = self.fetch_schedule(line, stop_id, stop_nr).await?;
                Ok::<_, anyhow::Error>(Some(schedule).filter(|s| !s.rides.is_empty()))
            })
            .await;

        info!("Finished getting data for stop: {stop_id}");
        data
    }

    /// Lines that serve stop post `stop_nr` of the given stop.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_lines_for_bus_stop(&self, stop_nr: &str, stop: &StopRef) -> Option<Vec<String>> {
        self.lines_for(stop_nr, stop)
            .await
            .or_log("get_lines_for_bus_stop")
    }

    /// Resolves a stop name (e.g. `"pl. Bankowy"`) to its group id.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_bus_stop_id(&self, stop_name: &str) -> Option<String> {
        self.fetch_stop_id(stop_name)
            .await
            .or_log("get_bus_stop_id")
    }

    async fn poll<T, F, Fut>(&self, amount: usize, mut call: F) -> Vec<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let mut data = Vec::new();

        for attempt in 1..=amount {
            match call().await {
                Ok(Some(batch)) => {
                    data.push(batch);
                    info!("Got data {}/{amount}", data.len());
                    if attempt < amount && !self.poll_interval.is_zero() {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                Ok(None) => error!("No data to save - Data {}/{amount}", data.len()),
                Err(e) => error!(error = %e, "Error getting data"),
            }
        }

        data
    }

    async fn fetch_vehicles(&self, line: &str, vehicle_type: VehicleType) -> Result<Vec<ZtmVehicle>> {
        let url = vehicles_url(&self.bus_tram_url, vehicle_type, line, None)?;
        let rows = fetch_json::<Envelope<RawVehicle>, _>(&self.http, url)
            .await?
            .into_rows()?;

        let vehicles = rows
            .into_iter()
            .filter_map(|raw| {
                let number = raw.vehicle_number.clone();
                ZtmVehicle::try_from(raw)
                    .inspect_err(|e| warn!(vehicle = %number, error = %e, "Skipping vehicle"))
                    .ok()
            })
            .collect();

        Ok(vehicles)
    }

    async fn fetch_schedule(&self, line: &str, stop_id: &str, stop_nr: &str) -> Result<ScheduleRecord> {
        let url = timetable_url(&self.stop_url, stop_id, stop_nr, line)?;
        let rows = fetch_json::<Envelope<ValueSet>, _>(&self.http, url)
            .await?
            .into_rows()?;

        Ok(ScheduleRecord {
            line: line.to_string(),
            bus_stop_id: stop_id.to_string(),
            bus_stop_nr: stop_nr.to_string(),
            rides: rows.iter().filter_map(Ride::from_values).collect(),
        })
    }

    async fn fetch_stop_id(&self, stop_name: &str) -> Result<String> {
        if stop_name.trim().is_empty() {
            return Err(LocatorError::EmptyInput("stop name").into());
        }

        let url = stop_id_url(&self.stop_url, stop_name)?;
        let rows = fetch_json::<Envelope<ValueSet>, _>(&self.http, url)
            .await?
            .into_rows()?;

        rows.iter()
            .find_map(|row| row.get("zespol"))
            .map(str::to_string)
            .with_context(|| format!("no bus stop named '{stop_name}'"))
    }

    async fn fetch_lines(&self, stop_id: &str, stop_nr: &str) -> Result<Vec<String>> {
        let url = stop_lines_url(&self.stop_url, stop_id, stop_nr)?;
        let rows = fetch_json::<Envelope<ValueSet>, _>(&self.http, url)
            .await?
            .into_rows()?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("linia"))
            .map(str::to_string)
            .collect())
    }

    async fn lines_for(&self, stop_nr: &str, stop: &StopRef) -> Result<Vec<String>> {
        let stop_id = self.resolve_stop(stop).await?;
        self.fetch_lines(&stop_id, stop_nr).await
    }

    async fn resolve_stop(&self, stop: &StopRef) -> Result<String> {
        match stop {
            StopRef::Id(id) if id.trim().is_empty() => Err(LocatorError::EmptyInput("stop id").into()),
            StopRef::Id(id) => Ok(id.clone()),
            StopRef::Name(name) => self.fetch_stop_id(name).await,
        }
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    Some(items).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiSettings;
    use crate::fetch::stub::StubClient;
    use crate::ztm::url::{STOP_ID_BY_NAME_ID, STOP_LINES_ID, TIMETABLE_ID, VEHICLES_RESOURCE_ID};

    const BUSES: &str = r#"{"result": [
        {"Lines": "512", "Lon": 21.01, "VehicleNumber": "1001", "Time": "2024-05-01 12:00:05", "Lat": 52.23, "Brigade": "1"},
        {"Lines": "512", "Lon": 21.05, "VehicleNumber": "1002", "Time": "2024-05-01 12:00:07", "Lat": 52.21, "Brigade": "2"}
    ]}"#;
    const API_ERROR: &str = r#"{"result": "Błędna metoda lub parametry wywołania"}"#;
    const EMPTY: &str = r#"{"result": []}"#;

    fn settings() -> ApiSettings {
        let mut settings = ApiSettings::default();
        settings.api_keys.ztm_key = Some("test-key".into());
        settings
    }

    fn client(stub: StubClient) -> ZtmClient<StubClient> {
        ZtmClient::new(stub, &settings())
            .unwrap()
            .with_poll_interval(Duration::ZERO)
    }

    #[test]
    fn missing_key_is_rejected() {
        let result = ZtmClient::new(StubClient::new(), &ApiSettings::default());
        assert!(matches!(result, Err(LocatorError::MissingApiKey)));
    }

    #[tokio::test]
    async fn vehicles_polled_amount_times() {
        let ztm = client(StubClient::new().route(VEHICLES_RESOURCE_ID, 200, BUSES));

        let data = ztm
            .get_vehicles_location_data("512", VehicleType::Bus, 3)
            .await;

        assert_eq!(data.len(), 3);
        assert_eq!(data[0].len(), 2);
        assert_eq!(data[0][1].vehicle_number, "1002");
        assert_eq!(data[0][0].time, "2024-05-01 12:00:05");

        let seen = ztm.http.inner.requests();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].url.contains("type=1"));
        assert!(seen[0].url.ends_with("apikey=test-key"));
    }

    #[tokio::test]
    async fn failed_and_empty_polls_are_skipped() {
        let stub = StubClient::new()
            .route(VEHICLES_RESOURCE_ID, 200, API_ERROR)
            .route(VEHICLES_RESOURCE_ID, 200, EMPTY)
            .route(VEHICLES_RESOURCE_ID, 500, "boom")
            .route(VEHICLES_RESOURCE_ID, 200, BUSES);
        let ztm = client(stub);

        let data = ztm
            .get_vehicles_location_data("512", VehicleType::Bus, 4)
            .await;

        assert_eq!(data.len(), 1);
        assert_eq!(ztm.http.inner.requests().len(), 4);
    }

    fn paced_client(stub: StubClient) -> ZtmClient<StubClient> {
        ZtmClient::new(stub, &settings()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_only_between_successful_polls() {
        let stub = StubClient::new()
            .route(VEHICLES_RESOURCE_ID, 200, BUSES)
            .route(VEHICLES_RESOURCE_ID, 500, "boom")
            .route(VEHICLES_RESOURCE_ID, 200, BUSES);
        let ztm = paced_client(stub);
        let interval = settings().poll_interval();

        let started = tokio::time::Instant::now();
        let data = ztm
            .get_vehicles_location_data("512", VehicleType::Bus, 3)
            .await;

        assert_eq!(data.len(), 2);
        assert_eq!(started.elapsed(), interval);
    }

    #[tokio::test(start_paused = true)]
    async fn no_sleep_after_failures_or_last_poll() {
        let stub = StubClient::new()
            .route(VEHICLES_RESOURCE_ID, 500, "boom")
            .route(VEHICLES_RESOURCE_ID, 200, EMPTY)
            .route(VEHICLES_RESOURCE_ID, 200, BUSES);
        let ztm = paced_client(stub);

        let started = tokio::time::Instant::now();
        let data = ztm.get_lat_lon_for_vehicle("512", VehicleType::Bus, 3).await;

        assert_eq!(data.len(), 2);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_amount_does_not_preallocate() {
        let ztm = paced_client(StubClient::new().route(VEHICLES_RESOURCE_ID, 200, BUSES));

        // polls at 0s, 22s and 44s fit before the deadline
        let polling = ztm.get_lat_lon_for_vehicle("512", VehicleType::Bus, usize::MAX);
        let result = tokio::time::timeout(Duration::from_secs(60), polling).await;

        assert!(result.is_err());
        assert_eq!(ztm.http.inner.requests().len(), 3);
    }

    #[tokio::test]
    async fn empty_line_yields_nothing_without_calls() {
        let ztm = client(StubClient::new().route(VEHICLES_RESOURCE_ID, 200, BUSES));

        assert!(ztm.get_vehicles_location_data("", VehicleType::Bus, 1).await.is_empty());
        assert!(ztm.get_lat_lon_for_vehicle(" ", VehicleType::Tram, 1).await.is_empty());
        assert!(ztm.http.inner.requests().is_empty());
    }

    #[tokio::test]
    async fn zero_amount_yields_nothing() {
        let ztm = client(StubClient::new().route(VEHICLES_RESOURCE_ID, 200, BUSES));

        assert!(ztm.get_vehicles_location_data("512", VehicleType::Bus, 0).await.is_empty());
        assert!(ztm.get_lat_lon_for_vehicle("512", VehicleType::Bus, 0).await.is_empty());
    }

    #[tokio::test]
    async fn lat_lon_is_flattened_across_polls() {
        let ztm = client(StubClient::new().route(VEHICLES_RESOURCE_ID, 200, BUSES));

        let points = ztm.get_lat_lon_for_vehicle("512", VehicleType::Bus, 2).await;

        assert_eq!(points.len(), 4);
        assert_eq!(points[1], LatLon { lat: 52.21, lon: 21.05 });
    }

    #[tokio::test]
    async fn schedule_by_name_resolves_stop_once() {
        let stub = StubClient::new()
            .route(
                STOP_ID_BY_NAME_ID,
                200,
                r#"{"result": [{"values": [{"key": "zespol", "value": "7009"}, {"key": "nazwa_zespolu", "value": "pl. Bankowy"}]}]}"#,
            )
            .route(
                TIMETABLE_ID,
                200,
                r#"{"result": [
                    {"values": [{"key": "symbol_1", "value": "null"}, {"key": "brygada", "value": "3"}, {"key": "kierunek", "value": "Dworzec Centralny"}, {"key": "trasa", "value": "TP-DWC"}, {"key": "czas", "value": "05:06:00"}]},
                    {"values": [{"key": "brygada", "value": "4"}, {"key": "kierunek", "value": "Dworzec Centralny"}, {"key": "trasa", "value": "TP-DWC"}, {"key": "czas", "value": "05:36:00"}]}
                ]}"#,
            );
        let ztm = client(stub);

        let data = ztm
            .get_stop_schedule_data("523", "01", 2, &StopRef::Name("pl. Bankowy".into()))
            .await;

        assert_eq!(data.len(), 2);
        assert_eq!(data[0].bus_stop_id, "7009");
        assert_eq!(data[0].rides.len(), 2);
        assert_eq!(data[0].rides[0].brigade.as_deref(), Some("3"));

        let seen = ztm.http.inner.requests();
        assert_eq!(seen.len(), 3);
        assert!(seen[1].url.contains("busstopId=7009"));
        assert!(seen[1].url.contains("busstopNr=01"));
    }

    #[tokio::test]
    async fn schedule_with_empty_line_is_empty() {
        let ztm = client(StubClient::new());
        let data = ztm
            .get_stop_schedule_data("", "01", 1, &StopRef::Id("7009".into()))
            .await;
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn schedule_for_unknown_stop_is_empty() {
        let ztm = client(StubClient::new().route(STOP_ID_BY_NAME_ID, 200, EMPTY));
        let data = ztm
            .get_stop_schedule_data("523", "01", 1, &StopRef::Name("Nowhere".into()))
            .await;
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn lines_for_stop() {
        let ztm = client(StubClient::new().route(
            STOP_LINES_ID,
            200,
            r#"{"result": [{"values": [{"key": "linia", "value": "128"}]}, {"values": [{"key": "linia", "value": "523"}]}]}"#,
        ));

        let lines = ztm
            .get_lines_for_bus_stop("01", &StopRef::Id("7009".into()))
            .await;
        assert_eq!(lines, Some(vec!["128".to_string(), "523".to_string()]));
    }

    #[tokio::test]
    async fn lines_for_stop_api_error_is_none() {
        let ztm = client(StubClient::new().route(STOP_LINES_ID, 200, API_ERROR));
        let lines = ztm
            .get_lines_for_bus_stop("01", &StopRef::Id("7009".into()))
            .await;
        assert!(lines.is_none());
    }

    #[tokio::test]
    async fn empty_stop_name_is_none() {
        let ztm = client(StubClient::new());
        assert!(ztm.get_bus_stop_id("").await.is_none());
        assert!(ztm.http.inner.requests().is_empty());
    }
}
