//! ==============================================================================
//! mock.rs - demo sensor grid
//! ==============================================================================
//!
//! purpose:
//!     front-end work doesn't need a sensor on a usb port. this generates a
//!     fake deployment: 8 sensors scattered around (45.0, 3.0), one sample
//!     per day for the last 7 days. nothing is cached, every call is fresh.
//!
//! relationships:
//!     - used by: api.rs (/demo routes)
//!     - independent of the serial pipeline
//!
//! ==============================================================================

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

pub const SENSOR_COUNT: u32 = 8;
pub const DAYS: i64 = 7;

/// Fire risk above which a marker is drawn red.
pub const RISK_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Serialize)]
pub struct MockSample {
    pub sensor_id: u32,
    pub lat: f64,
    pub lon: f64,
    pub date: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub fire_risk: f64,
    pub marker_color: &'static str,
}

pub fn marker_color(fire_risk: f64) -> &'static str {
    if fire_risk > RISK_THRESHOLD {
        "red"
    } else {
        "green"
    }
}

/// One row per sensor per day, newest day first for each sensor.
pub fn generate<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> Vec<MockSample> {
    let mut rows = Vec::with_capacity((SENSOR_COUNT as usize) * DAYS as usize);
    for sensor_id in 1..=SENSOR_COUNT {
        // a sensor doesn't move between days
        let lat = 45.0 + rng.gen_range(-0.05..=0.05);
        let lon = 3.0 + rng.gen_range(-0.05..=0.05);
        for day in 0..DAYS {
            let fire_risk = rng.gen_range(0.0..=30.0);
            rows.push(MockSample {
                sensor_id,
                lat,
                lon,
                date: now - Duration::days(day),
                temperature: rng.gen_range(18.0..=24.0),
                humidity: rng.gen_range(50.0..=60.0),
                fire_risk,
                marker_color: marker_color(fire_risk),
            });
        }
    }
    rows
}

/// Rows for one sensor, or `None` for an id outside the demo grid.
pub fn generate_for<R: Rng>(
    rng: &mut R,
    now: DateTime<Utc>,
    sensor_id: u32,
) -> Option<Vec<MockSample>> {
    if !(1..=SENSOR_COUNT).contains(&sensor_id) {
        return None;
    }
    Some(
        generate(rng, now)
            .into_iter()
            .filter(|s| s.sensor_id == sensor_id)
            .collect(),
    )
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn grid_has_eight_sensors_over_seven_days() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();
        let rows = generate(&mut rng, now);
        assert_eq!(rows.len(), 56);

        for row in &rows {
            assert!((18.0..=24.0).contains(&row.temperature));
            assert!((50.0..=60.0).contains(&row.humidity));
            assert!((0.0..=30.0).contains(&row.fire_risk));
            assert!((row.lat - 45.0).abs() <= 0.05 + 1e-9);
            assert_eq!(row.marker_color, "green");
        }

        let first = &rows[..7];
        assert!(first.iter().all(|r| r.sensor_id == 1 && r.lat == first[0].lat));
        assert_eq!(first[6].date, now - Duration::days(6));
    }

    #[test]
    fn per_sensor_rows() {
        let mut rng = StdRng::seed_from_u64(1);
        let rows = generate_for(&mut rng, Utc::now(), 3).unwrap();
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.sensor_id == 3));
        assert!(generate_for(&mut rng, Utc::now(), 9).is_none());
        assert!(generate_for(&mut rng, Utc::now(), 0).is_none());
    }

    #[test]
    fn marker_turns_red_above_threshold() {
        assert_eq!(marker_color(50.0), "green");
        assert_eq!(marker_color(50.1), "red");
    }
}
