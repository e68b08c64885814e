//! Comma-separated tables for calibration records and shaper fits.

use crate::{
    calibration_data::{CalibrationData, MAX_FREQ},
    error::Result,
    selector::CalibrationResults,
};
use std::io::Write;

/// Scale applied to per-bin shaper responses so they sit next to PSD values.
const RESPONSE_SCALE: f64 = 10_000.0;

/// Write the per-axis PSD table `freq,psd_x,psd_y,psd_z,psd_xyz`, stopping at
/// the first bin at or above 200 Hz.
pub fn write_calibration_data<W: Write>(mut out: W, data: &CalibrationData) -> Result<()> {
    writeln!(out, "freq,psd_x,psd_y,psd_z,psd_xyz")?;
    for i in 0..data.len() {
        let freq = data.freq_bins()[i];
        if freq >= MAX_FREQ {
            break;
        }
        writeln!(
            out,
            "{:.6},{:.6},{:.6},{:.6},{:.6}",
            freq,
            data.psd_x()[i],
            data.psd_y()[i],
            data.psd_z()[i],
            data.psd_sum()[i]
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Write the shaper report: the PSDs, the PSD left after the recommended
/// shaper, and the scaled response of every fitted family, one row per bin
/// the shapers were fitted on.
pub fn write_shaper_report<W: Write>(
    mut out: W,
    data: &CalibrationData,
    results: &CalibrationResults,
) -> Result<()> {
    let best = results.best();
    let shapers = results.all_shapers();

    let mut header = String::from("freq_bins, psd_sum, psd_x, psd_y, psd_z, after_shaper");
    for shaper in shapers {
        header.push_str(", ");
        header.push_str(shaper.name());
        header.push_str("_vibrs");
    }
    writeln!(out, "{header}")?;

    let rows = shapers
        .iter()
        .map(|s| s.vals.len())
        .fold(best.vals.len().min(data.len()), usize::min);
    for i in 0..rows {
        let psd_sum = data.psd_sum()[i];
        let mut line = format!(
            "{:.6}, {:.6}, {:.6}, {:.6}, {:.6}, {:.6}",
            data.freq_bins()[i],
            psd_sum,
            data.psd_x()[i],
            data.psd_y()[i],
            data.psd_z()[i],
            best.vibrs * psd_sum
        );
        for shaper in shapers {
            line.push_str(&format!(", {:.6}", shaper.vals[i] * RESPONSE_SCALE));
        }
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
