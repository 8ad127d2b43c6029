//! Wire shapes of the ZTM API and the flat records exported from them.

use crate::error::LocatorError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const ZTM_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleType {
    Bus = 1,
    Tram = 2,
}

impl TryFrom<u8> for VehicleType {
    type Error = LocatorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VehicleType::Bus),
            2 => Ok(VehicleType::Tram),
            other => Err(LocatorError::InvalidVehicleType(other)),
        }
    }
}

impl VehicleType {
    /// Value of the `type` query parameter.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// How a bus stop is addressed: by its numeric group id (`7009`) or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopRef {
    Id(String),
    Name(String),
}

/// Every ZTM response is `{"result": ...}`. On failure `result` is a
/// human-readable string instead of a list.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    result: ApiResult<T>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResult<T> {
    Rows(Vec<T>),
    Message(String),
}

impl<T> Envelope<T> {
    pub(crate) fn into_rows(self) -> Result<Vec<T>, LocatorError> {
        match self.result {
            ApiResult::Rows(rows) => Ok(rows),
            ApiResult::Message(msg) => Err(LocatorError::Api(msg)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawVehicle {
    pub lines: String,
    pub lon: f64,
    pub lat: f64,
    pub vehicle_number: String,
    pub time: String,
    pub brigade: String,
}

/// Timetable resources answer with rows of `{"values": [{"key", "value"}]}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ValueSet {
    values: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    value: String,
}

impl ValueSet {
    /// The API spells missing values as the string `"null"`.
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
            .filter(|v| *v != "null")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZtmVehicle {
    pub lines: String,
    pub location: Coordinates,
    pub vehicle_number: String,
    pub time: NaiveDateTime,
    pub brigade: String,
}

impl TryFrom<RawVehicle> for ZtmVehicle {
    type Error = chrono::ParseError;

    fn try_from(raw: RawVehicle) -> Result<Self, Self::Error> {
        Ok(Self {
            time: NaiveDateTime::parse_from_str(&raw.time, ZTM_TIME_FORMAT)?,
            lines: raw.lines,
            location: Coordinates {
                latitude: raw.lat,
                longitude: raw.lon,
            },
            vehicle_number: raw.vehicle_number,
            brigade: raw.brigade,
        })
    }
}

/// One vehicle position as written to CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VehicleRecord {
    pub lines: String,
    pub lon: f64,
    pub lat: f64,
    pub vehicle_number: String,
    pub time: String,
    pub brigade: String,
}

impl From<&ZtmVehicle> for VehicleRecord {
    fn from(v: &ZtmVehicle) -> Self {
        Self {
            lines: v.lines.clone(),
            lon: v.location.longitude,
            lat: v.location.latitude,
            vehicle_number: v.vehicle_number.clone(),
            time: v.time.format(ZTM_TIME_FORMAT).to_string(),
            brigade: v.brigade.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    #[serde(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Lon")]
    pub lon: f64,
}

impl From<&ZtmVehicle> for LatLon {
    fn from(v: &ZtmVehicle) -> Self {
        Self {
            lat: v.location.latitude,
            lon: v.location.longitude,
        }
    }
}

/// A single departure from a stop post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ride {
    pub brigade: Option<String>,
    pub direction: Option<String>,
    pub route: Option<String>,
    /// `HH:MM:SS`; the hour runs past 23 for night departures.
    pub time: String,
}

impl Ride {
    pub(crate) fn from_values(values: &ValueSet) -> Option<Self> {
        Some(Self {
            time: values.get("czas")?.to_string(),
            brigade: values.get("brygada").map(str::to_string),
            direction: values.get("kierunek").map(str::to_string),
            route: values.get("trasa").map(str::to_string),
        })
    }
}

/// The timetable of one line at one stop post.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleRecord {
    pub line: String,
    pub bus_stop_id: String,
    pub bus_stop_nr: String,
    pub rides: Vec<Ride>,
}

/// One ride of a [`ScheduleRecord`], flattened for CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RideRow {
    pub line: String,
    pub bus_stop_id: String,
    pub bus_stop_nr: String,
    pub brigade: Option<String>,
    pub direction: Option<String>,
    pub route: Option<String>,
    pub time: String,
}

impl ScheduleRecord {
    pub fn ride_rows(&self) -> Vec<RideRow> {
        self.rides
            .iter()
            .map(|ride| RideRow {
                line: self.line.clone(),
                bus_stop_id: self.bus_stop_id.clone(),
                bus_stop_nr: self.bus_stop_nr.clone(),
                brigade: ride.brigade.clone(),
                direction: ride.direction.clone(),
                route: ride.route.clone(),
                time: ride.time.clone(),
            })
            .collect()
    }
}
