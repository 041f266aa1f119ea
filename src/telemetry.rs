//! Trajectory export with fixed column labels.
//!
//! Values are written in SI units with angles in radians; conversion for
//! display is left to whatever consumes the file.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::dynamics::OutputMode;
use crate::error::SimulationError;
use crate::simulation::Trajectory;

pub const STATE_LABELS: [&str; 12] = [
    "pos_x", "pos_y", "pos_z", "vel_x", "vel_y", "vel_z", "phi", "theta", "psi", "p", "q", "r",
];

pub const INSTRUMENTED_LABELS: [&str; 20] = [
    "pos_x", "pos_y", "pos_z", "vel_x", "vel_y", "vel_z", "phi", "theta", "psi", "p", "q", "r",
    "r1", "r2", "r3", "r4", "thrust", "torque_x", "torque_y", "torque_z",
];

/// Column labels of [`crate::dynamics::output`] for `mode`.
pub fn labels(mode: OutputMode) -> &'static [&'static str] {
    match mode {
        OutputMode::States => &STATE_LABELS,
        OutputMode::Instrumented => &INSTRUMENTED_LABELS,
    }
}

/// Writes `time` followed by every output column, one row per sample.
pub fn write_csv<W: Write>(trajectory: &Trajectory, writer: W) -> Result<(), SimulationError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["time"];
    header.extend_from_slice(trajectory.labels());
    wtr.write_record(&header)?;

    for (t, _, _, out) in trajectory.samples() {
        let mut row = Vec::with_capacity(out.len() + 1);
        row.push(t.to_string());
        row.extend(out.iter().map(|v| v.to_string()));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file<P: AsRef<Path>>(
    trajectory: &Trajectory,
    path: P,
) -> Result<(), SimulationError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    write_csv(trajectory, file)?;
    debug!(path = %path.display(), rows = trajectory.len(), "trajectory written");
    Ok(())
}
