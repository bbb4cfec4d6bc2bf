//! Geographic extents and positions.

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

use super::GeoError;

/// A geographic position in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cartographic {
    /// Longitude in radians, positive east.
    pub longitude: f64,
    /// Latitude in radians, positive north.
    pub latitude: f64,
}

impl Cartographic {
    /// Creates a position from radians.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Creates a position from degrees.
    pub fn from_degrees(longitude: f64, latitude: f64) -> Self {
        Self::new(longitude.to_radians(), latitude.to_radians())
    }
}

/// A west/south/east/north bounding rectangle in radians.
///
/// Extents built through [`Extent::new`] are validated. Extents produced by
/// [`Extent::intersect_with`] may be empty; check [`Extent::is_empty`] before
/// relying on their area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Extent {
    /// The largest possible extent: the whole globe.
    pub const MAX_VALUE: Extent = Extent {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };

    /// Creates a validated extent from radians.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidExtent`] when any bound is not finite, lies
    /// outside the valid longitude/latitude range, or when the bounds are
    /// inverted.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, GeoError> {
        let extent = Self {
            west,
            south,
            east,
            north,
        };

        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(GeoError::InvalidExtent {
                extent,
                reason: "bounds must be finite",
            });
        }
        if !(-PI..=PI).contains(&west) || !(-PI..=PI).contains(&east) {
            return Err(GeoError::InvalidExtent {
                extent,
                reason: "longitude must be within [-pi, pi]",
            });
        }
        if !(-FRAC_PI_2..=FRAC_PI_2).contains(&south) || !(-FRAC_PI_2..=FRAC_PI_2).contains(&north)
        {
            return Err(GeoError::InvalidExtent {
                extent,
                reason: "latitude must be within [-pi/2, pi/2]",
            });
        }
        if south > north {
            return Err(GeoError::InvalidExtent {
                extent,
                reason: "south must not exceed north",
            });
        }
        if west > east {
            return Err(GeoError::InvalidExtent {
                extent,
                reason: "west must not exceed east",
            });
        }

        Ok(extent)
    }

    /// Creates a validated extent from degrees.
    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Result<Self, GeoError> {
        Self::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }

    /// Computes the overlap of two extents.
    ///
    /// The result is empty (see [`is_empty`](Self::is_empty)) when the
    /// extents do not overlap.
    pub fn intersect_with(&self, other: &Extent) -> Extent {
        Extent {
            west: self.west.max(other.west),
            south: self.south.max(other.south),
            east: self.east.min(other.east),
            north: self.north.min(other.north),
        }
    }

    /// Returns true if the extent encloses no area.
    pub fn is_empty(&self) -> bool {
        self.east <= self.west || self.north <= self.south
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn northwest(&self) -> Cartographic {
        Cartographic::new(self.west, self.north)
    }

    pub fn southeast(&self) -> Cartographic {
        Cartographic::new(self.east, self.south)
    }

    /// Returns the latitude in this extent closest to the equator.
    ///
    /// Zero when the extent straddles the equator.
    pub fn latitude_closest_to_equator(&self) -> f64 {
        if self.south > 0.0 {
            self.south
        } else if self.north < 0.0 {
            self.north
        } else {
            0.0
        }
    }

    /// Returns the extent's bounds converted to degrees, as `(w, s, e, n)`.
    pub fn to_degrees(&self) -> (f64, f64, f64, f64) {
        (
            self.west.to_degrees(),
            self.south.to_degrees(),
            self.east.to_degrees(),
            self.north.to_degrees(),
        )
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, s, e, n) = self.to_degrees();
        write!(f, "[{:.6}°, {:.6}°, {:.6}°, {:.6}°]", w, s, e, n)
    }
}
