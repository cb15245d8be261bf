use crate::error::{DashboardError, DashboardResult};
use geo::Point;
use serde::Serialize;

/// A validated WGS84 location. Latitude and longitude are kept in named
/// fields so the point geometry is always built in x = lon, y = lat order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> DashboardResult<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(DashboardError::Validation("invalid coordinates".to_string()));
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(DashboardError::Validation(format!(
                "invalid coordinates: lat {} lon {}",
                lat, lon
            )));
        }
        Ok(Self { lat, lon })
    }

    /// Parses typed text input, e.g. "23.8351" and "90.2564".
    pub fn parse(lat: &str, lon: &str) -> DashboardResult<Self> {
        let lat: f64 = lat.trim().parse().map_err(|_| {
            DashboardError::Validation(format!("latitude '{}' is not a number", lat.trim()))
        })?;
        let lon: f64 = lon.trim().parse().map_err(|_| {
            DashboardError::Validation(format!("longitude '{}' is not a number", lon.trim()))
        })?;
        Self::new(lat, lon)
    }

    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_is_longitude_first() {
        let point = Coordinate::new(23.8351, 90.2564).unwrap().to_point();
        assert_eq!(point.x(), 90.2564);
        assert_eq!(point.y(), 23.8351);
    }

    #[test]
    fn latitude_bounds_are_inclusive() {
        assert!(Coordinate::new(90.0, 0.0).is_ok());
        assert!(Coordinate::new(-90.0, 0.0).is_ok());
        assert!(matches!(
            Coordinate::new(90.0001, 0.0),
            Err(DashboardError::Validation(_))
        ));
    }

    #[test]
    fn longitude_bounds_are_inclusive() {
        assert!(Coordinate::new(0.0, 180.0).is_ok());
        assert!(Coordinate::new(0.0, -180.0).is_ok());
        assert!(Coordinate::new(0.0, -180.0001).is_err());
    }

    #[test]
    fn rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn parses_typed_input() {
        let c = Coordinate::parse(" 23.8351", "90.2564 ").unwrap();
        assert_eq!(c, Coordinate { lat: 23.8351, lon: 90.2564 });
        assert!(matches!(
            Coordinate::parse("north", "90"),
            Err(DashboardError::Validation(_))
        ));
        assert!(Coordinate::parse("", "90").is_err());
    }
}
