//! Per-vehicle race metrics and their export format.

use serde::Serialize;
use std::io::{self, Write};

/// Running totals for one vehicle over one race.
#[derive(Clone, Debug, PartialEq)]
pub struct Metrics {
    /// Race time in s; stops when the vehicle finishes.
    elapsed: f64,
    /// Wall, cone and vehicle collisions.
    collisions: u32,
    /// Frames on which steering jumped by more than `correction_threshold`.
    corrections: u32,
    correction_threshold: f64,
    last_steer: f64,
    /// The race time at which the vehicle finished.
    finish_time: Option<f64>,
}

impl Metrics {
    pub fn new(correction_threshold: f64) -> Self {
        Self {
            elapsed: 0.0,
            collisions: 0,
            corrections: 0,
            correction_threshold,
            last_steer: 0.0,
            finish_time: None,
        }
    }

    /// Records one frame of driving.
    pub fn update(&mut self, dt: f64, collided: bool, steer: f64) {
        if self.finish_time.is_none() {
            self.elapsed += dt;
        }
        if collided {
            self.collisions += 1;
        }
        if (steer - self.last_steer).abs() > self.correction_threshold {
            self.corrections += 1;
        }
        self.last_steer = steer;
    }

    /// Records a collision which happened outside the vehicle's own frame,
    /// such as contact with another vehicle.
    pub fn record_collision(&mut self) {
        self.collisions += 1;
    }

    /// Stops the clock.
    pub fn finish(&mut self) {
        self.finish_time.get_or_insert(self.elapsed);
    }

    /// The race time in s.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// The number of collisions.
    pub fn collisions(&self) -> u32 {
        self.collisions
    }

    /// The number of large steering corrections.
    pub fn corrections(&self) -> u32 {
        self.corrections
    }

    /// The race time at which the vehicle finished, if it has.
    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }
}

/// The final figures for one vehicle, as exported at the end of a race.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VehicleReport {
    pub time_s: f64,
    pub collisions: u32,
    pub corrections: u32,
    pub laps: u32,
    pub label: String,
}

impl VehicleReport {
    pub const CSV_HEADER: &'static str = "time_s,collisions,corrections,laps,label";

    /// Formats the report as a CSV row, with the time rounded to hundredths.
    pub fn csv_row(&self) -> String {
        format!(
            "{:.2},{},{},{},{}",
            self.time_s,
            self.collisions,
            self.corrections,
            self.laps,
            csv_field(&self.label)
        )
    }
}

/// Writes a header and one row per report.
pub fn write_csv<'a>(
    mut out: impl Write,
    reports: impl IntoIterator<Item = &'a VehicleReport>,
) -> io::Result<()> {
    writeln!(out, "{}", VehicleReport::CSV_HEADER)?;
    for report in reports {
        writeln!(out, "{}", report.csv_row())?;
    }
    Ok(())
}

/// Quotes a field if it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
