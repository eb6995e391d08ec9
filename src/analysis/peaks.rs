// Local-maximum peak search with height, distance and prominence filters
//
// Candidates are strict local maxima; flat tops count as one peak at the
// plateau midpoint (rounded down). Filters run in a fixed order:
//
// 1. height: keep peaks with value >= min_height
// 2. distance: visit peaks from highest to lowest and suppress any
//    neighbour closer than `distance` samples; among equal heights the later
//    sample wins
// 3. prominence: keep peaks with prominence >= min_prominence
//
// References:
// - scipy.signal.find_peaks (SciPy 1.x)

use crate::error::{DetectionError, Result};

/// Filters applied by `find_peaks`; `None` disables a filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakParams {
    pub min_height: Option<f64>,
    pub min_prominence: Option<f64>,
    /// Minimum index gap between retained peaks (>= 1)
    pub distance: Option<usize>,
}

impl PeakParams {
    pub fn with_height(min_height: f64) -> Self {
        Self {
            min_height: Some(min_height),
            ..Self::default()
        }
    }
}

/// Indices of peaks in `data` that pass every configured filter, ascending
///
/// # Errors
/// `InvalidParameter` when `distance` is `Some(0)`.
pub fn find_peaks(data: &[f64], params: &PeakParams) -> Result<Vec<usize>> {
    if params.distance == Some(0) {
        return Err(DetectionError::invalid_parameter(
            "distance",
            "must be at least 1",
        ));
    }

    let mut peaks = local_maxima(data);

    if let Some(min_height) = params.min_height {
        peaks.retain(|&i| data[i] >= min_height);
    }

    if let Some(distance) = params.distance {
        if distance > 1 {
            peaks = select_by_distance(data, &peaks, distance);
        }
    }

    if let Some(min_prominence) = params.min_prominence {
        peaks.retain(|&i| prominence(data, i) >= min_prominence);
    }

    Ok(peaks)
}

/// Strict local maxima, flat tops reduced to their midpoint
///
/// A plateau that runs into the last sample is not a peak.
pub fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if data.len() < 3 {
        return peaks;
    }

    let last = data.len() - 1;
    let mut i = 1;
    while i < last {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < last && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of `data[peak]` above the higher of its two bases
///
/// Each base is the minimum reached while walking outward until a strictly
/// higher sample or the signal boundary.
pub fn prominence(data: &[f64], peak: usize) -> f64 {
    let height = data[peak];

    let left_min = data[..=peak]
        .iter()
        .rev()
        .take_while(|&&v| v <= height)
        .fold(height, |acc, &v| acc.min(v));
    let right_min = data[peak..]
        .iter()
        .take_while(|&&v| v <= height)
        .fold(height, |acc, &v| acc.min(v));

    height - left_min.max(right_min)
}

fn select_by_distance(data: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];

    // Stable sort: equal heights keep index order, so the later one is
    // visited first when iterating from the back
    let mut by_priority: Vec<usize> = (0..peaks.len()).collect();
    by_priority.sort_by(|&a, &b| data[peaks[a]].total_cmp(&data[peaks[b]]));

    for &j in by_priority.iter().rev() {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in (j + 1)..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_maxima_simple() {
        let data = [0.0, 1.0, 0.0, 2.0, 1.0, 3.0, 0.0];
        assert_eq!(local_maxima(&data), vec![1, 3, 5]);
    }

    #[test]
    fn test_endpoints_are_never_peaks() {
        let data = [5.0, 1.0, 2.0, 1.0, 5.0];
        assert_eq!(local_maxima(&data), vec![2]);
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_plateau_midpoint_rounds_down() {
        // Plateau over indices 1..=4, midpoint (1 + 4) / 2 = 2
        let data = [0.0, 2.0, 2.0, 2.0, 2.0, 0.0];
        assert_eq!(local_maxima(&data), vec![2]);
    }

    #[test]
    fn test_plateau_touching_end_is_ignored() {
        let data = [0.0, 1.0, 3.0, 3.0, 3.0];
        assert!(local_maxima(&data).is_empty());
    }

    #[test]
    fn test_height_filter_is_inclusive() {
        let data = [0.0, 1.0, 0.0, 2.0, 0.0];
        let peaks = find_peaks(&data, &PeakParams::with_height(2.0)).unwrap();
        assert_eq!(peaks, vec![3]);
    }

    #[test]
    fn test_prominence_uses_higher_base() {
        // Peak at 3 (value 4): left base min 1 (stops at 5 at index 1),
        // right base min 0 (runs to boundary), prominence = 4 - 1 = 3
        let data = [0.0, 5.0, 1.0, 4.0, 2.0, 0.0];
        assert_eq!(prominence(&data, 3), 3.0);
        assert_eq!(prominence(&data, 1), 5.0);
    }

    #[test]
    fn test_prominence_filter() {
        let data = [0.0, 5.0, 4.5, 4.8, 0.0, 3.0, 0.0];
        let params = PeakParams {
            min_prominence: Some(1.0),
            ..PeakParams::default()
        };
        assert_eq!(find_peaks(&data, &params).unwrap(), vec![1, 5]);
    }

    #[test]
    fn test_distance_keeps_highest_in_neighbourhood() {
        let data = [0.0, 3.0, 0.0, 5.0, 0.0, 4.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        let params = PeakParams {
            distance: Some(3),
            ..PeakParams::default()
        };
        // 5@3 suppresses 3@1 and 4@5; 2@9 is 6 samples away
        assert_eq!(find_peaks(&data, &params).unwrap(), vec![3, 9]);
    }

    #[test]
    fn test_distance_tie_prefers_later_peak() {
        let data = [0.0, 2.0, 0.0, 2.0, 0.0];
        let params = PeakParams {
            distance: Some(3),
            ..PeakParams::default()
        };
        assert_eq!(find_peaks(&data, &params).unwrap(), vec![3]);
    }

    #[test]
    fn test_distance_applies_before_prominence() {
        // 9.5@4 suppresses 5@6 by distance, then fails the prominence test
        // itself (shallow valley towards 10@1); 5@6 does not come back
        let data = [0.0, 10.0, 9.2, 9.1, 9.5, 0.0, 5.0, 0.0];
        let params = PeakParams {
            min_height: None,
            min_prominence: Some(2.0),
            distance: Some(3),
        };
        assert_eq!(find_peaks(&data, &params).unwrap(), vec![1]);
        assert!(prominence(&data, 6) >= 2.0);
    }

    #[test]
    fn test_rejects_zero_distance() {
        let params = PeakParams {
            distance: Some(0),
            ..PeakParams::default()
        };
        assert!(find_peaks(&[0.0, 1.0, 0.0], &params).is_err());
    }
}
