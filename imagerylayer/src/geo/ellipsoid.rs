//! Reference ellipsoid.

/// A triaxial ellipsoid described by its radii in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    radii: (f64, f64, f64),
}

impl Ellipsoid {
    /// The WGS84 ellipsoid.
    pub const WGS84: Ellipsoid = Ellipsoid {
        radii: (6_378_137.0, 6_378_137.0, 6_356_752.314_245_179),
    };

    /// A sphere with unit radius.
    pub const UNIT_SPHERE: Ellipsoid = Ellipsoid {
        radii: (1.0, 1.0, 1.0),
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { radii: (x, y, z) }
    }

    pub fn radii(&self) -> (f64, f64, f64) {
        self.radii
    }

    /// The largest of the three radii.
    pub fn maximum_radius(&self) -> f64 {
        self.radii.0.max(self.radii.1).max(self.radii.2)
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_maximum_radius_is_equatorial() {
        assert_eq!(Ellipsoid::WGS84.maximum_radius(), 6_378_137.0);
    }

    #[test]
    fn test_maximum_radius_picks_largest_axis() {
        assert_eq!(Ellipsoid::new(1.0, 3.0, 2.0).maximum_radius(), 3.0);
    }
}
