/// Foot-contact and stride metrics derived from one ankle's pixel-position
/// history. `None` fields mean "not enough contacts to report", never a
/// fabricated value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrideMetrics {
    pub contact_count: usize,
    /// Hz; `1 / mean interval between contacts`.
    pub frequency_hz: Option<f64>,
    /// Pixels; mean forward displacement between consecutive contacts.
    pub stride_length_px: Option<f64>,
}

/// Ankle velocity magnitude (pixels/second) per consecutive sample pair,
/// from a dense `(x, y)` position history sampled every `dt` seconds.
fn velocity_magnitudes(positions: &[(f64, f64)], dt: f64) -> Vec<f64> {
    positions
        .windows(2)
        .map(|w| {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt() / dt
        })
        .collect()
}

/// Contact frames are local minima of ankle speed below
/// `contact_threshold` (pixels/second).
fn contact_indices(speeds: &[f64], contact_threshold: f64) -> Vec<usize> {
    let mut contacts = Vec::new();
    for i in 0..speeds.len() {
        let is_local_min = (i == 0 || speeds[i] <= speeds[i - 1])
            && (i == speeds.len() - 1 || speeds[i] <= speeds[i + 1]);
        if is_local_min && speeds[i] < contact_threshold {
            contacts.push(i);
        }
    }
    contacts
}

/// Computes stride metrics for one ankle from its position history. The
/// speed series has one fewer sample than `positions`; a speed-series
/// index `i` corresponds to the displacement between `positions[i]` and
/// `positions[i+1]`, taken to land at `positions[i+1]`.
pub fn stride_metrics(positions: &[(f64, f64)], dt: f64, contact_threshold: f64) -> StrideMetrics {
    if positions.len() < 3 {
        return StrideMetrics::default();
    }
    let speeds = velocity_magnitudes(positions, dt);
    let contact_speed_indices = contact_indices(&speeds, contact_threshold);
    let contact_position_indices: Vec<usize> =
        contact_speed_indices.iter().map(|&i| i + 1).collect();

    let contact_count = contact_position_indices.len();
    if contact_count < 2 {
        return StrideMetrics {
            contact_count,
            frequency_hz: None,
            stride_length_px: None,
        };
    }

    let intervals: Vec<f64> = contact_position_indices
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 * dt)
        .collect();
    let mean_interval = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let frequency_hz = if mean_interval > 0.0 {
        Some(1.0 / mean_interval)
    } else {
        None
    };

    let displacements: Vec<f64> = contact_position_indices
        .windows(2)
        .map(|w| (positions[w[1]].0 - positions[w[0]].0).abs())
        .collect();
    let stride_length_px = Some(displacements.iter().sum::<f64>() / displacements.len() as f64);

    StrideMetrics {
        contact_count,
        frequency_hz,
        stride_length_px,
    }
}

/// `|left_contacts - right_contacts|`.
pub fn asymmetry(left: &StrideMetrics, right: &StrideMetrics) -> u32 {
    (left.contact_count as i64 - right.contact_count as i64).unsigned_abs() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_reports_nothing() {
        let metrics = stride_metrics(&[(0.0, 0.0), (1.0, 0.0)], 1.0 / 30.0, 50.0);
        assert_eq!(metrics.contact_count, 0);
        assert!(metrics.frequency_hz.is_none());
    }

    #[test]
    fn periodic_stationary_dips_are_detected_as_contacts() {
        // Ankle oscillates: fast swing, then a brief near-stationary dip,
        // repeated three times, each dip advancing forward by 20px.
        let mut positions = Vec::new();
        let mut x = 0.0;
        for _ in 0..3 {
            positions.push((x, 0.0));
            positions.push((x + 15.0, 0.0));
            x += 20.0;
            positions.push((x, 0.0));
            positions.push((x, 0.0));
        }
        let metrics = stride_metrics(&positions, 1.0 / 30.0, 200.0);
        assert!(metrics.contact_count >= 2);
        assert!(metrics.frequency_hz.unwrap() > 0.0);
        assert!(metrics.stride_length_px.unwrap() > 0.0);
    }

    #[test]
    fn asymmetry_is_absolute_difference_in_contact_counts() {
        let left = StrideMetrics { contact_count: 5, frequency_hz: None, stride_length_px: None };
        let right = StrideMetrics { contact_count: 3, frequency_hz: None, stride_length_px: None };
        assert_eq!(asymmetry(&left, &right), 2);
    }
}
