// Copyright (c) 2026 P2P-DPRD Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Great-circle distance between two latitude/longitude points.

/// Mean Earth radius, meters (IUGG mean radius).
pub const EARTH_RADIUS_M: f64 = 6_371_008.7714;

/// Haversine great-circle distance between two points, in meters.
///
/// Inputs are degrees; the return value is always finite and non-negative
/// for finite, in-range inputs.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero_distance() {
        assert_eq!(haversine_distance_m(59.9, 10.7, 59.9, 10.7), 0.0);
    }

    #[test]
    fn known_distance_oslo_to_bergen() {
        // Oslo (59.9139, 10.7522) to Bergen (60.3913, 5.3221): ~305 km.
        let d = haversine_distance_m(59.9139, 10.7522, 60.3913, 5.3221);
        assert!((300_000.0..=312_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = haversine_distance_m(0.0, 0.0, 0.0, 180.0);
        let expected = std::f64::consts::PI * EARTH_RADIUS_M;
        assert!((d - expected).abs() < 1.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let d1 = haversine_distance_m(10.0, 20.0, 30.0, 40.0);
        let d2 = haversine_distance_m(30.0, 40.0, 10.0, 20.0);
        assert!((d1 - d2).abs() < 1e-6);
    }
}
