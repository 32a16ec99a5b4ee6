//! Trajectory smoothing.
//!
//! Savitzky-Golay filtering over contiguous detected runs. Near the ends of
//! a run the polynomial fitted to the first (or last) full window is
//! evaluated at the edge positions instead of padding the signal.
//!
//! Gap handling:
//! - interior gaps shorter than the window are linearly interpolated and
//!   flagged, so fit quality never scores them
//! - longer gaps and leading/trailing gaps stay empty
//! - runs shorter than the window pass through unsmoothed

use rayon::prelude::*;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::{MediaError, MediaResult};
use crate::tracks::{PixelPoint, RawTracks, Track, TrackId};

/// Precomputed Savitzky-Golay weights.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    degree: usize,
    /// `weights[p][j]`: contribution of window sample `j` to the fitted
    /// value at window position `p`.
    weights: Vec<Vec<f64>>,
}

impl SavitzkyGolay {
    pub fn new(window: usize, degree: usize) -> MediaResult<Self> {
        if window < 3 || window % 2 == 0 {
            return Err(MediaError::invalid_config(format!(
                "Savitzky-Golay window must be odd and at least 3, got {window}"
            )));
        }
        if degree >= window {
            return Err(MediaError::invalid_config(format!(
                "Savitzky-Golay degree {degree} must be below window {window}"
            )));
        }

        let half = (window / 2) as f64;
        let terms = degree + 1;
        let design: Vec<Vec<f64>> = (0..window)
            .map(|j| {
                let x = j as f64 - half;
                (0..terms).map(|k| x.powi(k as i32)).collect()
            })
            .collect();

        // Normal matrix AᵀA
        let mut normal = vec![vec![0.0; terms]; terms];
        for row in &design {
            for a in 0..terms {
                for b in 0..terms {
                    normal[a][b] += row[a] * row[b];
                }
            }
        }

        let mut weights = Vec::with_capacity(window);
        for p in 0..window {
            let z = solve_linear(&normal, &design[p]).ok_or_else(|| {
                MediaError::internal("Savitzky-Golay normal matrix is singular")
            })?;
            let row: Vec<f64> = design
                .iter()
                .map(|a| a.iter().zip(&z).map(|(x, y)| x * y).sum())
                .collect();
            weights.push(row);
        }

        Ok(Self {
            window,
            degree,
            weights,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> MediaResult<Self> {
        Self::new(config.smoothing_window, config.smoothing_degree)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Smooth one contiguous run with no gaps.
    pub fn smooth_run(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        if n < self.window {
            return values.to_vec();
        }
        let half = self.window / 2;
        (0..n)
            .map(|i| {
                let start = i.saturating_sub(half).min(n - self.window);
                let pos = i - start;
                self.weights[pos]
                    .iter()
                    .zip(&values[start..start + self.window])
                    .map(|(w, v)| w * v)
                    .sum()
            })
            .collect()
    }
}

/// Gaussian elimination with partial pivoting on a small dense system.
fn solve_linear(matrix: &[Vec<f64>], rhs: &[f64]) -> Option<Vec<f64>> {
    let n = rhs.len();
    let mut a: Vec<Vec<f64>> = matrix
        .iter()
        .zip(rhs)
        .map(|(row, &b)| {
            let mut r = row.clone();
            r.push(b);
            r
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..=n {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (a[row][n] - tail) / a[row][row];
    }
    Some(x)
}

/// Smoothed positions of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothedTrack {
    points: Vec<Option<PixelPoint>>,
    interpolated: Vec<bool>,
    raw: Vec<Option<PixelPoint>>,
}

impl SmoothedTrack {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Smoothed position, `None` where there is no signal.
    pub fn at(&self, frame: usize) -> Option<PixelPoint> {
        self.points.get(frame).copied().flatten()
    }

    /// Trusted raw position before smoothing.
    pub fn raw_at(&self, frame: usize) -> Option<PixelPoint> {
        self.raw.get(frame).copied().flatten()
    }

    pub fn is_interpolated(&self, frame: usize) -> bool {
        self.interpolated.get(frame).copied().unwrap_or(false)
    }

    pub fn points(&self) -> &[Option<PixelPoint>] {
        &self.points
    }

    /// Raw, non-interpolated samples in `[center - half, center + half]`.
    pub fn raw_samples_near(&self, center: usize, half: usize) -> usize {
        window_range(center, half, self.len())
            .filter(|&i| self.raw_at(i).is_some() && !self.is_interpolated(i))
            .count()
    }
}

fn window_range(center: usize, half: usize, len: usize) -> std::ops::Range<usize> {
    let start = center.saturating_sub(half);
    let end = (center + half + 1).min(len);
    start..end.max(start)
}

/// Smooth a raw track. Samples below `threshold` count as gaps.
pub fn smooth_track(track: &Track, threshold: f64, filter: &SavitzkyGolay) -> SmoothedTrack {
    let raw = track.trusted_points(threshold);
    let n = raw.len();

    let mut filled = raw.clone();
    let mut interpolated = vec![false; n];
    fill_short_gaps(&mut filled, &mut interpolated, filter.window());

    let mut points = vec![None; n];
    let mut i = 0;
    while i < n {
        if filled[i].is_none() {
            i += 1;
            continue;
        }
        let start = i;
        while i < n && filled[i].is_some() {
            i += 1;
        }
        let run: Vec<PixelPoint> = filled[start..i].iter().flatten().copied().collect();
        let xs: Vec<f64> = run.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = run.iter().map(|p| p.y).collect();
        let sx = filter.smooth_run(&xs);
        let sy = filter.smooth_run(&ys);
        for (k, (x, y)) in sx.into_iter().zip(sy).enumerate() {
            points[start + k] = Some(PixelPoint::new(x, y));
        }
    }

    SmoothedTrack {
        points,
        interpolated,
        raw,
    }
}

/// Linearly interpolate interior gaps shorter than `window`.
fn fill_short_gaps(points: &mut [Option<PixelPoint>], flags: &mut [bool], window: usize) {
    let mut last: Option<usize> = None;
    for i in 0..points.len() {
        let Some(curr) = points[i] else {
            continue;
        };
        if let Some(prev_idx) = last {
            let gap = i - prev_idx - 1;
            if gap > 0 && gap < window {
                if let Some(prev) = points[prev_idx] {
                    let span = (i - prev_idx) as f64;
                    for k in prev_idx + 1..i {
                        let t = (k - prev_idx) as f64 / span;
                        points[k] = Some(PixelPoint::new(
                            prev.x + (curr.x - prev.x) * t,
                            prev.y + (curr.y - prev.y) * t,
                        ));
                        flags[k] = true;
                    }
                }
            }
        }
        last = Some(i);
    }
}

/// Smoothed tracks for every entity of a clip.
#[derive(Debug, Clone)]
pub struct SmoothedTracks {
    tracks: Vec<SmoothedTrack>,
}

impl SmoothedTracks {
    pub fn get(&self, id: TrackId) -> &SmoothedTrack {
        &self.tracks[id.index()]
    }

    pub fn keypoint(&self, kp: javelin_models::KeypointIndex) -> &SmoothedTrack {
        self.get(TrackId::Keypoint(kp))
    }

    pub fn implement(&self) -> &SmoothedTrack {
        self.get(TrackId::Implement)
    }
}

/// Smooth every track in parallel. Output order follows [`TrackId::all`].
pub fn smooth_all(
    raw: &RawTracks,
    config: &AnalysisConfig,
    filter: &SavitzkyGolay,
) -> SmoothedTracks {
    let ids: Vec<TrackId> = TrackId::all().collect();
    let tracks: Vec<SmoothedTrack> = ids
        .par_iter()
        .map(|&id| {
            let threshold = if id.is_implement() {
                config.implement_confidence_threshold
            } else {
                config.pose_confidence_threshold
            };
            smooth_track(raw.track(id), threshold, filter)
        })
        .collect();

    debug!(
        tracks = tracks.len(),
        window = filter.window(),
        degree = filter.degree(),
        "Smoothed tracks"
    );

    SmoothedTracks { tracks }
}

/// R² of smoothed against raw positions in `[center ± half]`.
///
/// Only raw, non-interpolated samples count; x and y residuals are pooled.
/// Needs at least three samples.
pub fn fit_r2(track: &SmoothedTrack, center: usize, half: usize) -> Option<f64> {
    let pairs: Vec<(PixelPoint, PixelPoint)> = window_range(center, half, track.len())
        .filter(|&i| !track.is_interpolated(i))
        .filter_map(|i| Some((track.raw_at(i)?, track.at(i)?)))
        .collect();

    if pairs.len() < 3 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(r, _)| r.x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(r, _)| r.y).sum::<f64>() / n;

    let ss_res: f64 = pairs
        .iter()
        .map(|(r, s)| (r.x - s.x).powi(2) + (r.y - s.y).powi(2))
        .sum();
    let ss_tot: f64 = pairs
        .iter()
        .map(|(r, _)| (r.x - mean_x).powi(2) + (r.y - mean_y).powi(2))
        .sum();

    const EPS: f64 = 1e-12;
    if ss_tot < EPS {
        return Some(if ss_res < EPS { 1.0 } else { 0.0 });
    }
    Some(1.0 - ss_res / ss_tot)
}
