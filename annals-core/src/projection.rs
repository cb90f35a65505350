use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::MapData;

/// One axis of the georeference: a third-degree bivariate polynomial in
/// (latitude, longitude). Coefficient order follows the fitted model:
/// 1, lat, lon, lat^2, lat*lon, lon^2, lat^3, lat^2*lon, lat*lon^2, lon^3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicSurface {
    pub intercept: f64,
    pub coefficients: [f64; 10],
}

impl CubicSurface {
    pub fn evaluate(&self, lat: f64, lon: f64) -> f64 {
        let c = &self.coefficients;
        self.intercept
            + c[0]
            + c[1] * lat
            + c[2] * lon
            + c[3] * lat * lat
            + c[4] * lat * lon
            + c[5] * lon * lon
            + c[6] * lat * lat * lat
            + c[7] * lat * lat * lon
            + c[8] * lat * lon * lon
            + c[9] * lon * lon * lon
    }
}

/// Lat/long to base-map pixel projection. The defaults are the surfaces
/// fitted against the hand-surveyed control points for the Scotland base
/// image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub x: CubicSurface,
    pub y: CubicSurface,
}

impl Default for Projection {
    fn default() -> Self {
        Projection {
            x: CubicSurface {
                intercept: -3081.148,
                coefficients: [
                    -5.40e-07, 268.2856, 472.7847, -5.2413, -8.2911, -1.6347, 0.03218, 0.04388,
                    0.02912, -0.00457,
                ],
            },
            y: CubicSurface {
                intercept: 8073.893,
                coefficients: [
                    -2.71e-07, 134.4546, 236.9145, -7.21995, -8.89493, -2.73564, 0.04395, 0.08062,
                    0.03345, 0.00779,
                ],
            },
        }
    }
}

impl Projection {
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        (self.x.evaluate(lat, lon), self.y.evaluate(lat, lon))
    }

    /// Worst control-point residual, for sanity-checking a projection against
    /// the survey table before trusting it.
    pub fn max_residual(&self, points: &[ControlPoint]) -> Option<Residual> {
        points
            .iter()
            .map(|p| {
                let (x, y) = self.project(p.latitude, p.longitude);
                let dx = x - p.pixel_x;
                let dy = y - p.pixel_y;
                Residual {
                    point: *p,
                    dx,
                    dy,
                    distance: (dx * dx + dy * dy).sqrt(),
                }
            })
            .max_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// A surveyed pixel fix on the base image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Residual {
    pub point: ControlPoint,
    pub dx: f64,
    pub dy: f64,
    pub distance: f64,
}

/// The nine fixes the Scotland base image was georeferenced against.
pub const SCOTLAND_CONTROL_POINTS: [ControlPoint; 9] = [
    ControlPoint { latitude: 58.5, longitude: -3.5, pixel_x: 637.0, pixel_y: 46.0 },
    ControlPoint { latitude: 56.0, longitude: -2.5, pixel_x: 792.0, pixel_y: 695.0 },
    ControlPoint { latitude: 56.5, longitude: -5.5, pixel_x: 356.0, pixel_y: 568.0 },
    ControlPoint { latitude: 57.0, longitude: -2.0, pixel_x: 856.0, pixel_y: 432.0 },
    ControlPoint { latitude: 56.0, longitude: -3.5, pixel_x: 646.0, pixel_y: 698.0 },
    ControlPoint { latitude: 55.0, longitude: -1.5, pixel_x: 949.0, pixel_y: 951.0 },
    ControlPoint { latitude: 55.0, longitude: -7.5, pixel_x: 52.0, pixel_y: 950.0 },
    ControlPoint { latitude: 58.5, longitude: -8.0, pixel_x: 22.0, pixel_y: 36.0 },
    ControlPoint { latitude: 58.5, longitude: -1.5, pixel_x: 912.0, pixel_y: 39.0 },
];

/// Geographic bounding box grown from tile corners, upper-left and
/// lower-right at a time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        }
    }
}

impl BoundingBox {
    pub fn include_corners(&mut self, ul_lon: f64, ul_lat: f64, lr_lon: f64, lr_lat: f64) {
        self.min_lon = self.min_lon.min(ul_lon);
        self.max_lon = self.max_lon.max(lr_lon);
        self.max_lat = self.max_lat.max(ul_lat);
        self.min_lat = self.min_lat.min(lr_lat);
    }

    pub fn is_empty(&self) -> bool {
        !self.min_lon.is_finite()
    }
}

/// Project every burgh and store its pixel position back on the record,
/// unrounded as the original pipeline kept it. Returns how many burghs were
/// updated.
pub fn assign_burgh_pixels(map_data: &mut MapData, projection: &Projection) -> usize {
    let mut updated = 0;
    for burgh in map_data.burghs.values_mut() {
        let (x, y) = projection.project(burgh.latitude, burgh.longitude);
        if !x.is_finite() || !y.is_finite() {
            warn!(burgh = %burgh.name, "projection produced a non-finite pixel");
            continue;
        }
        burgh.x_pixel = Some(x);
        burgh.y_pixel = Some(y);
        updated += 1;
    }
    updated
}
