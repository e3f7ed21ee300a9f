//! Positional interpolation.
//!
//! Leaves no gaps behind: nulls before the first observed value take that
//! value, nulls after the last observed value take the last one.

use crate::config::InterpolationMethod;

/// Fill interior gaps by position, then extend the edges.
pub fn interpolate(values: &[Option<f64>], method: InterpolationMethod) -> Vec<Option<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| !x.is_nan()).map(|x| (i, x)))
        .collect();
    let (Some(&(first_idx, first)), Some(&(last_idx, last))) = (known.first(), known.last()) else {
        return values.to_vec();
    };

    let mut output = values.to_vec();
    for (i, slot) in output.iter_mut().enumerate() {
        if slot.is_some_and(|x| !x.is_nan()) {
            continue;
        }
        *slot = Some(if i < first_idx {
            first
        } else if i > last_idx {
            last
        } else {
            // Neighbouring observations around position i.
            let upper = known.partition_point(|(k, _)| *k < i);
            let (x0, y0) = known[upper - 1];
            let (x1, y1) = known[upper];
            match method {
                InterpolationMethod::Linear => {
                    y0 + (y1 - y0) * (i - x0) as f64 / (x1 - x0) as f64
                }
                InterpolationMethod::Nearest => {
                    if i - x0 <= x1 - i {
                        y0
                    } else {
                        y1
                    }
                }
                InterpolationMethod::Zero => y0,
            }
        });
    }
    output
}
