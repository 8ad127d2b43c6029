//! NMEA 0183 GGA (GPS fix data) decoding.
//!
//! ```text
//! $GPGGA,123519.00,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47
//!        |time     |lat     | |lon      | | |  |   |
//!        1         2        3 4         5 6 7  8   9
//! ```

use crate::error::LocatorError;
use crate::guard::OrLog;
use chrono::NaiveTime;
use nmea::ParseResult;
use nmea::sentences::{FixType, GgaData};
use serde::Serialize;

pub const GPGGA_TAG: &str = "$GPGGA";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpsFix {
    /// Raw `ddmm.mmmm`, negative in the southern hemisphere.
    pub latitude: f64,
    /// Raw `dddmm.mmmm`, negative in the western hemisphere.
    pub longitude: f64,
    pub time: Option<NaiveTime>,
    /// 0 = invalid, 1 = GPS, 2 = DGPS, ...
    pub quality: Option<u8>,
    pub satellites: Option<u8>,
    pub hdop: Option<f32>,
    /// Meters above mean sea level.
    pub altitude: Option<f32>,
}

impl GpsFix {
    /// `(latitude, longitude)` in signed decimal degrees.
    pub fn to_decimal_degrees(&self) -> (f64, f64) {
        (nmea_to_degrees(self.latitude), nmea_to_degrees(self.longitude))
    }
}

fn nmea_to_degrees(value: f64) -> f64 {
    let magnitude = value.abs();
    let degrees = (magnitude / 100.0).trunc();
    let minutes = magnitude - degrees * 100.0;
    (degrees + minutes / 60.0).copysign(value)
}

/// Decodes the comma-separated fields of a GGA sentence.
///
/// Only latitude and longitude are required. Returns `None` (after logging)
/// when either is missing or malformed.
#[tracing::instrument(level = "debug")]
pub fn parse_gpgga(fields: &[&str]) -> Option<GpsFix> {
    try_parse(fields).or_log("parse_gpgga")
}

fn try_parse(fields: &[&str]) -> Result<GpsFix, LocatorError> {
    let field = |i: usize| fields.get(i).map(|f| f.trim()).unwrap_or("");
    let malformed = |what: &str| LocatorError::MalformedSentence(format!("{what} in {fields:?}"));

    let latitude: f64 = field(2).parse().map_err(|_| malformed("latitude"))?;
    let longitude: f64 = field(4).parse().map_err(|_| malformed("longitude"))?;

    let latitude = match field(3) {
        "N" => latitude,
        "S" => -latitude,
        _ => return Err(malformed("latitude hemisphere")),
    };
    let longitude = match field(5) {
        "E" => longitude,
        "W" => -longitude,
        _ => return Err(malformed("longitude hemisphere")),
    };

    Ok(GpsFix {
        latitude,
        longitude,
        time: NaiveTime::parse_from_str(field(1), "%H%M%S%.f").ok(),
        quality: field(6).parse().ok(),
        satellites: field(7).parse().ok(),
        hdop: field(8).parse().ok(),
        altitude: field(9).parse().ok(),
    })
}

/// Decodes a full `$GPGGA,...*hh` line with the `nmea` parser.
///
/// The `*hh` checksum must be present and match. Returns `None` (after
/// logging) for other sentence types, bad framing and bad checksums, and
/// `None` without logging for a GGA that carries no position yet.
#[tracing::instrument(level = "debug")]
pub fn parse_gpgga_sentence(sentence: &str) -> Option<GpsFix> {
    decode_gga(sentence).or_log("parse_gpgga_sentence")?
}

fn decode_gga(sentence: &str) -> Result<Option<GpsFix>, LocatorError> {
    let sentence = sentence.trim();
    match nmea::parse_str(sentence) {
        Ok(ParseResult::GGA(gga)) => Ok(GpsFix::from_gga(&gga)),
        Ok(_) => Err(LocatorError::MalformedSentence(format!(
            "not a GGA sentence: {sentence}"
        ))),
        Err(e) => Err(LocatorError::MalformedSentence(format!("{e:?} in {sentence}"))),
    }
}

impl GpsFix {
    /// `nmea` reports decimal degrees; the fix keeps the raw `ddmm.mmmm` form.
    fn from_gga(gga: &GgaData) -> Option<Self> {
        Some(Self {
            latitude: degrees_to_nmea(gga.latitude?),
            longitude: degrees_to_nmea(gga.longitude?),
            time: gga.fix_time,
            quality: gga.fix_type.as_ref().and_then(quality_code),
            satellites: gga.fix_satellites.and_then(|n| u8::try_from(n).ok()),
            hdop: gga.hdop,
            altitude: gga.altitude,
        })
    }
}

fn degrees_to_nmea(value: f64) -> f64 {
    let magnitude = value.abs();
    let degrees = magnitude.trunc();
    let raw = degrees * 100.0 + (magnitude - degrees) * 60.0;
    // drop the float noise of the degree round trip
    ((raw * 1e7).round() / 1e7).copysign(value)
}

/// GGA field 6.
fn quality_code(fix_type: &FixType) -> Option<u8> {
    let code = match fix_type {
        FixType::Invalid => 0,
        FixType::Gps => 1,
        FixType::DGps => 2,
        FixType::Pps => 3,
        FixType::Rtk => 4,
        FixType::FloatRtk => 5,
        FixType::Estimated => 6,
        FixType::Manual => 7,
        FixType::Simulation => 8,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(code)
}
