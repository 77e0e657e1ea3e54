//! Geofence verification.
//!
//! Straight-line (great-circle) distance only; routed or walking distance
//! is not considered.

use chrono::{DateTime, Duration, Utc};

use crate::error::LocationError;
use crate::types::{GeoFence, LocationSample};

/// Mean earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates, in metres.
pub fn haversine_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Clamp guards asin against a > 1 from rounding at antipodes
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}

/// Validates a location sample against a quest geofence.
#[derive(Debug, Clone)]
pub struct LocationVerifier {
    /// Samples older than this are treated as missing
    max_sample_age: Duration,
}

impl LocationVerifier {
    pub fn new(max_sample_age: Duration) -> Self {
        Self { max_sample_age }
    }

    /// Check `sample` against `fence` at instant `now`.
    ///
    /// Quests without a geofence always pass, even with no sample.
    /// A mocked sample fails with [`LocationError::Spoofed`] before its age,
    /// coordinates or distance are looked at.
    pub fn verify(
        &self,
        fence: Option<&GeoFence>,
        sample: Option<&LocationSample>,
        now: DateTime<Utc>,
    ) -> Result<(), LocationError> {
        let Some(fence) = fence else {
            return Ok(());
        };

        let sample = sample.ok_or(LocationError::Unavailable)?;
        if sample.is_suspected_mock {
            return Err(LocationError::Spoofed);
        }
        if now - sample.recorded_at > self.max_sample_age {
            return Err(LocationError::Unavailable);
        }
        if !sample.latitude.is_finite() || !sample.longitude.is_finite() {
            return Err(LocationError::Unavailable);
        }

        let distance_m =
            haversine_distance_m(sample.latitude, sample.longitude, fence.latitude, fence.longitude);
        if distance_m <= fence.radius_m {
            Ok(())
        } else {
            Err(LocationError::OutOfRange {
                distance_m,
                radius_m: fence.radius_m,
            })
        }
    }
}

impl Default for LocationVerifier {
    fn default() -> Self {
        Self::new(Duration::seconds(30))
    }
}
