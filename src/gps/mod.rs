//! Serial GPS receivers speaking NMEA 0183.

pub mod gpgga;
mod receiver;

pub use gpgga::{GpsFix, parse_gpgga, parse_gpgga_sentence};
pub use receiver::{
    DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT, DEFAULT_TIMEOUT, get_gps_location, read_gpgga_fix,
};
