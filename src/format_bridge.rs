//! Format bridge (C3, spec §4.3): pure conversions between the
//! `Vec<SParam>` form the measurement primitive produces and the
//! parallel-array `CalSet` form the calibration RPC exchanges. No state,
//! no I/O.

use crate::error::FormatBridgeError;
use crate::model::{CalSet, SParam};

/// Extract the frequency axis, in Hz, from a measurement.
pub fn meas_to_freq(points: &[SParam]) -> Vec<f64> {
    points.iter().map(|p| p.freq as f64).collect()
}

/// Repack a measurement into the RPC's parallel-array form.
pub fn meas_to_cal(points: &[SParam]) -> CalSet {
    let mut set = CalSet {
        s11: Vec::with_capacity(points.len()),
        s12: Vec::with_capacity(points.len()),
        s21: Vec::with_capacity(points.len()),
        s22: Vec::with_capacity(points.len()),
    };
    for p in points {
        set.s11.push(p.s11);
        set.s12.push(p.s12);
        set.s21.push(p.s21);
        set.s22.push(p.s22);
    }
    set
}

/// Recombine a frequency axis and a `CalSet` into a measurement.
///
/// The caller must supply arrays of equal length; unlike an in-process
/// caller, the RPC round trip crosses a process boundary, so this is
/// checked defensively rather than assumed.
pub fn cal_to_meas(freq: &[f64], cal: &CalSet) -> Result<Vec<SParam>, FormatBridgeError> {
    if freq.len() != cal.s11.len()
        || freq.len() != cal.s12.len()
        || freq.len() != cal.s21.len()
        || freq.len() != cal.s22.len()
    {
        return Err(FormatBridgeError::LengthMismatch {
            frequency: freq.len(),
            s11: cal.s11.len(),
        });
    }

    Ok(freq
        .iter()
        .enumerate()
        .map(|(i, &f)| SParam::new(f as u64, cal.s11[i], cal.s12[i], cal.s21[i], cal.s22[i]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Complex;

    fn sample() -> Vec<SParam> {
        vec![
            SParam::new(1_000, Complex::new(1.0, 0.0), Complex::new(0.1, 0.0), Complex::new(0.2, 0.0), Complex::new(1.0, 0.0)),
            SParam::new(2_000, Complex::new(0.9, 0.1), Complex::new(0.2, 0.0), Complex::new(0.3, 0.0), Complex::new(0.9, -0.1)),
        ]
    }

    #[test]
    fn meas_to_cal_then_cal_to_meas_round_trips() {
        let points = sample();
        let freq = meas_to_freq(&points);
        let cal = meas_to_cal(&points);
        let back = cal_to_meas(&freq, &cal).unwrap();
        assert_eq!(points, back);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let points = sample();
        let freq = meas_to_freq(&points);
        let mut cal = meas_to_cal(&points);
        cal.s11.pop();

        let err = cal_to_meas(&freq, &cal).unwrap_err();
        match err {
            FormatBridgeError::LengthMismatch { frequency, s11 } => {
                assert_eq!(frequency, 2);
                assert_eq!(s11, 1);
            }
        }
    }
}
