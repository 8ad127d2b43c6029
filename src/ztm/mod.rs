//! Warsaw public transport (ZTM) open-data API.
//!
//! [`ZtmClient`] polls vehicle positions and stop timetables and converts
//! them into flat records ready for [`crate::output`].

mod client;
pub mod model;
pub mod url;

pub use client::ZtmClient;
pub use model::{
    Coordinates, LatLon, Ride, RideRow, ScheduleRecord, StopRef, VehicleRecord, VehicleType,
    ZtmVehicle,
};
pub use url::build_api_url_ztm;
