use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RuleViolation;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 23.8103)]
    pub latitude: f64,
    #[schema(example = 90.4125)]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both halves of a coordinate pair must be present, and in range.
    pub fn from_parts(
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Option<Self>, RuleViolation> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => {
                let point = Self::new(lat, lng);
                if point.is_valid() {
                    Ok(Some(point))
                } else {
                    Err(RuleViolation::InvalidCoordinates)
                }
            }
            (None, None) => Ok(None),
            _ => Err(RuleViolation::InvalidCoordinates),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    pub center: GeoPoint,
    pub radius_m: f64,
}

impl Geofence {
    /// Returns the distance from the office when inside the fence.
    pub fn check(&self, point: GeoPoint) -> Result<f64, RuleViolation> {
        let distance_m = haversine_m(self.center, point);
        if distance_m <= self.radius_m {
            Ok(distance_m)
        } else {
            Err(RuleViolation::OutsideGeofence {
                distance_m,
                radius_m: self.radius_m,
            })
        }
    }
}

/// Approved outdoor duty waives the fence; the distance is still recorded
/// whenever a location was sent.
pub fn validate_check_in_location(
    fence: &Geofence,
    location: Option<GeoPoint>,
    outdoor_duty_approved: bool,
) -> Result<Option<f64>, RuleViolation> {
    match (location, outdoor_duty_approved) {
        (Some(point), true) => Ok(Some(haversine_m(fence.center, point))),
        (None, true) => Ok(None),
        (Some(point), false) => fence.check(point).map(Some),
        (None, false) => Err(RuleViolation::LocationRequired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> Geofence {
        Geofence {
            center: GeoPoint::new(23.8103, 90.4125),
            radius_m: 100.0,
        }
    }

    #[test]
    fn same_point_is_zero_distance() {
        let p = GeoPoint::new(23.8103, 90.4125);
        assert!(haversine_m(p, p).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_m(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let d = haversine_m(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn check_in_location_cases() {
        let fence = office();
        // ~55 m north of the office
        let near = GeoPoint::new(23.8108, 90.4125);
        // ~1.1 km north of the office
        let far = GeoPoint::new(23.8203, 90.4125);

        let cases = [
            (Some(near), false, true),
            (Some(far), false, false),
            (Some(far), true, true),
            (None, true, true),
            (None, false, false),
        ];

        for (location, od, accepted) in cases {
            let result = validate_check_in_location(&fence, location, od);
            assert_eq!(result.is_ok(), accepted, "{location:?} od={od}");
        }
    }

    #[test]
    fn rejection_reports_distance_and_radius() {
        let far = GeoPoint::new(23.8203, 90.4125);
        let err = validate_check_in_location(&office(), Some(far), false).unwrap_err();
        match err {
            RuleViolation::OutsideGeofence {
                distance_m,
                radius_m,
            } => {
                assert!(distance_m > 1_000.0 && distance_m < 1_200.0);
                assert_eq!(radius_m, 100.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_location_without_duty() {
        assert_eq!(
            validate_check_in_location(&office(), None, false),
            Err(RuleViolation::LocationRequired)
        );
    }

    #[test]
    fn coordinate_pairs() {
        assert_eq!(GeoPoint::from_parts(None, None), Ok(None));
        assert_eq!(
            GeoPoint::from_parts(Some(10.0), None),
            Err(RuleViolation::InvalidCoordinates)
        );
        assert_eq!(
            GeoPoint::from_parts(Some(91.0), Some(0.0)),
            Err(RuleViolation::InvalidCoordinates)
        );
        assert!(matches!(GeoPoint::from_parts(Some(1.0), Some(2.0)), Ok(Some(_))));
    }
}
