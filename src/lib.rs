//! Thin wrappers around public transit, geocoding and GPS data sources.
//!
//! - [`ztm`]: Warsaw ZTM vehicle positions and stop timetables
//! - [`geo`]: Nominatim geocoding, geodesic distance, IP location
//! - [`gps`]: NMEA GPGGA parsing and serial receivers
//! - [`output`]: CSV export of the collected records
//!
//! Every public operation logs its failures and returns an empty result
//! instead of an error (see [`guard`]).

pub mod config;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod gps;
pub mod guard;
pub mod output;
pub mod ztm;
