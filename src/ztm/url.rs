//! Endpoint URLs of the ZTM open-data API.
//!
//! The builders here never carry the API key; [`crate::ztm::ZtmClient`]
//! appends it through [`crate::fetch::layers::UrlParam`]. Only
//! [`build_api_url_ztm`] produces a complete, keyed URL.

use super::model::VehicleType;
use crate::config::ApiUrls;
use crate::error::LocatorError;
use crate::guard::OrLog;
use anyhow::Result;
use reqwest::Url;
use tracing::error;

pub const VEHICLES_RESOURCE_ID: &str = "f2e5503e-927d-4ad3-9500-4ab9e55deb59";
pub const TIMETABLE_ID: &str = "e923fa0e-d96c-43f9-ae6e-60518c9f3238";
pub const STOP_ID_BY_NAME_ID: &str = "b27f4c17-5c50-4a5b-89dd-236b282bc499";
pub const STOP_LINES_ID: &str = "88cd555f-6f31-43ca-9de4-66c479ad5942";
pub const STOP_SET_ID: &str = "ab75c33d-3a26-4342-b36a-6e5fef0a3ac3";

pub fn vehicles_url(
    base: &str,
    vehicle_type: VehicleType,
    line: &str,
    brigade: Option<&str>,
) -> Result<Url> {
    let code = vehicle_type.code().to_string();
    let mut url = Url::parse_with_params(
        base,
        &[
            ("resource_id", VEHICLES_RESOURCE_ID),
            ("type", code.as_str()),
            ("line", line),
        ],
    )?;
    if let Some(brigade) = brigade {
        url.query_pairs_mut().append_pair("brigade", brigade);
    }
    Ok(url)
}

pub fn timetable_url(base: &str, stop_id: &str, stop_nr: &str, line: &str) -> Result<Url> {
    Ok(Url::parse_with_params(
        base,
        &[
            ("id", TIMETABLE_ID),
            ("busstopId", stop_id),
            ("busstopNr", stop_nr),
            ("line", line),
        ],
    )?)
}

pub fn stop_id_url(base: &str, stop_name: &str) -> Result<Url> {
    Ok(Url::parse_with_params(
        base,
        &[("id", STOP_ID_BY_NAME_ID), ("name", stop_name)],
    )?)
}

pub fn stop_lines_url(base: &str, stop_id: &str, stop_nr: &str) -> Result<Url> {
    Ok(Url::parse_with_params(
        base,
        &[
            ("id", STOP_LINES_ID),
            ("busstopId", stop_id),
            ("busstopNr", stop_nr),
        ],
    )?)
}

/// Builds a keyed URL for either the vehicle-location resource or, when
/// `stop_id` is given, the stop-set resource filtered to that stop.
///
/// Returns `None` (after logging) when no API key is available.
pub fn build_api_url_ztm(
    urls: &ApiUrls,
    api_key: Option<&str>,
    vehicle_type: VehicleType,
    line: &str,
    brigade: Option<&str>,
    stop_id: Option<&str>,
) -> Option<Url> {
    let Some(api_key) = api_key.filter(|k| !k.is_empty()) else {
        error!("{}", LocatorError::MissingApiKey);
        return None;
    };

    let url = match stop_id {
        Some(stop_id) => Url::parse_with_params(
            &urls.ztm_stop_url,
            &[("id", STOP_SET_ID), ("busstopId", stop_id)],
        )
        .map_err(anyhow::Error::from),
        None => vehicles_url(&urls.ztm_bus_tram_url, vehicle_type, line, brigade),
    };

    url.map(|mut url| {
        url.query_pairs_mut().append_pair("apikey", api_key);
        url
    })
    .or_log("build_api_url_ztm")
}
