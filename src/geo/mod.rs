//! Geocoding, distance and client location.
//!
//! [`Geocoder`] is the seam for address lookups, implemented by
//! [`NominatimClient`]. [`MapApi`] adds the guarded public operations and
//! the distance calculation on top of any geocoder.

pub mod distance;
mod geocoder;
mod ip;
mod nominatim;

pub use distance::{DistanceUnit, geodesic_distance};
pub use geocoder::{Geocoder, MapApi, Place};
pub use ip::{ClientLocation, IpLocator};
pub use nominatim::{NominatimClient, USER_AGENT_NAME};
