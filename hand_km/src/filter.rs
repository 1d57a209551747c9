//! Butterworth low-pass smoothing of irregularly sampled channels.
//!
//! A channel is resampled onto a uniform grid, padded with its edge values,
//! run through a cascade of second-order sections forward and then backward
//! (zero phase), and interpolated back at the original sample times.

use std::f64::consts::PI;

/// One second-order low-pass section in direct form II.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Section {
    gain: f64,
    d1: f64,
    d2: f64,
}

impl Section {
    /// Internal state that yields a constant output for a constant `input`.
    fn steady_state(&self, input: f64) -> f64 {
        input / (1.0 - self.d1 - self.d2)
    }
}

/// Low-pass Butterworth cascade. `order` counts second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Butterworth {
    sections: Vec<Section>,
}

impl Butterworth {
    /// Designs the cascade for `cutoff` Hz at `sampling` Hz.
    /// The cutoff must lie strictly between zero and Nyquist.
    pub fn low_pass(order: usize, cutoff: f64, sampling: f64) -> Self {
        let a = (PI * cutoff / sampling).tan();
        let a2 = a * a;
        let sections = (0..order)
            .map(|i| {
                let r = (PI * (2.0 * i as f64 + 1.0) / (4.0 * order as f64)).sin();
                let s = a2 + 2.0 * a * r + 1.0;
                Section {
                    gain: a2 / s,
                    d1: 2.0 * (1.0 - a2) / s,
                    d2: -(a2 - 2.0 * a * r + 1.0) / s,
                }
            })
            .collect();
        Self { sections }
    }

    pub fn order(&self) -> usize {
        self.sections.len()
    }

    /// Causal pass over `samples` in place, starting from rest at `samples[0]`.
    pub fn apply(&self, samples: &mut [f64]) {
        let Some(&first) = samples.first() else {
            return;
        };
        let mut state: Vec<(f64, f64)> = self
            .sections
            .iter()
            .map(|s| {
                let w = s.steady_state(first);
                (w, w)
            })
            .collect();

        for sample in samples.iter_mut() {
            let mut x = *sample;
            for (section, (w1, w2)) in self.sections.iter().zip(state.iter_mut()) {
                let w0 = x + section.d1 * *w1 + section.d2 * *w2;
                x = section.gain * (w0 + 2.0 * *w1 + *w2);
                *w2 = *w1;
                *w1 = w0;
            }
            *sample = x;
        }
    }

    /// Zero-phase filtering: forward, then backward, with `pad` edge samples
    /// added on each side and removed again.
    pub fn apply_zero_phase(&self, samples: &[f64], pad: usize) -> Vec<f64> {
        let (Some(&first), Some(&last)) = (samples.first(), samples.last()) else {
            return Vec::new();
        };

        let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
        padded.extend(std::iter::repeat(first).take(pad));
        padded.extend_from_slice(samples);
        padded.extend(std::iter::repeat(last).take(pad));

        self.apply(&mut padded);
        padded.reverse();
        self.apply(&mut padded);
        padded.reverse();

        padded[pad..pad + samples.len()].to_vec()
    }
}

/// Settings of one smoothing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub cutoff_frequency: f64,
    pub filter_order: usize,
    pub samples_per_frame: usize,
}

/// Uniform resampling grid shared by every channel of one sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    start: f64,
    step: f64,
    len: usize,
    pub sampling_frequency: f64,
}

impl SampleGrid {
    /// Grid at `samples_per_frame` times the mean frame rate of `timestamps`.
    /// `None` when the timestamps span no time.
    pub fn for_timestamps(timestamps: &[f64], samples_per_frame: usize) -> Option<Self> {
        let (&start, &end) = (timestamps.first()?, timestamps.last()?);
        let span = end - start;
        if timestamps.len() < 2 || span <= 0.0 || !span.is_finite() {
            return None;
        }
        let frame_rate = (timestamps.len() - 1) as f64 / span;
        let sampling_frequency = frame_rate * samples_per_frame.max(1) as f64;
        let step = 1.0 / sampling_frequency;
        let len = (span / step).round() as usize + 1;
        Some(Self {
            start,
            step,
            len,
            sampling_frequency,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Time covered from the first grid point to the last.
    pub fn span(&self) -> f64 {
        self.step * self.len.saturating_sub(1) as f64
    }

    pub fn time(&self, k: usize) -> f64 {
        self.start + self.step * k as f64
    }

    /// Linear interpolation of (`times`, `values`) at every grid point.
    pub fn resample(&self, times: &[f64], values: &[f64]) -> Vec<f64> {
        let mut cursor = 0;
        (0..self.len)
            .map(|k| interpolate(times, values, self.time(k), &mut cursor))
            .collect()
    }

    /// Evaluates grid `samples` at arbitrary sorted `times`.
    pub fn sample_at(&self, samples: &[f64], times: &[f64]) -> Vec<f64> {
        times
            .iter()
            .map(|&t| {
                let pos = ((t - self.start) / self.step).clamp(0.0, (samples.len() - 1) as f64);
                let k = pos.floor() as usize;
                let frac = pos - k as f64;
                match samples.get(k + 1) {
                    Some(next) => samples[k] + (next - samples[k]) * frac,
                    None => samples[k],
                }
            })
            .collect()
    }
}

/// Evaluates the piecewise-linear function through (`times`, `values`) at `t`.
/// `cursor` remembers the last segment so monotone queries stay linear-time.
fn interpolate(times: &[f64], values: &[f64], t: f64, cursor: &mut usize) -> f64 {
    let last = times.len() - 1;
    if t <= times[0] {
        return values[0];
    }
    if t >= times[last] {
        return values[last];
    }
    while *cursor + 1 < last && times[*cursor + 1] <= t {
        *cursor += 1;
    }
    let (t0, t1) = (times[*cursor], times[*cursor + 1]);
    if t1 <= t0 {
        return values[*cursor + 1];
    }
    let frac = (t - t0) / (t1 - t0);
    values[*cursor] + (values[*cursor + 1] - values[*cursor]) * frac
}

/// Prepared smoothing for every channel of one sequence.
#[derive(Debug, Clone)]
pub struct ChannelSmoother {
    grid: SampleGrid,
    filter: Butterworth,
    pad: usize,
}

/// Why a sequence is left unfiltered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Passthrough {
    Disabled,
    TooShort,
    AboveNyquist { cutoff: f64, nyquist: f64 },
    /// The cutoff period is longer than the whole sequence.
    BelowResolution { cutoff: f64, lowest: f64 },
}

impl ChannelSmoother {
    pub fn new(timestamps: &[f64], smoothing: Smoothing) -> Result<Self, Passthrough> {
        if smoothing.cutoff_frequency <= 0.0 || smoothing.filter_order == 0 {
            return Err(Passthrough::Disabled);
        }
        let grid = SampleGrid::for_timestamps(timestamps, smoothing.samples_per_frame)
            .ok_or(Passthrough::TooShort)?;
        let nyquist = grid.sampling_frequency / 2.0;
        if smoothing.cutoff_frequency >= nyquist {
            return Err(Passthrough::AboveNyquist {
                cutoff: smoothing.cutoff_frequency,
                nyquist,
            });
        }
        let lowest = 1.0 / grid.span();
        if smoothing.cutoff_frequency < lowest {
            return Err(Passthrough::BelowResolution {
                cutoff: smoothing.cutoff_frequency,
                lowest,
            });
        }
        let filter = Butterworth::low_pass(
            smoothing.filter_order,
            smoothing.cutoff_frequency,
            grid.sampling_frequency,
        );
        let pad = edge_padding(&grid, smoothing);
        Ok(Self { grid, filter, pad })
    }

    pub fn grid(&self) -> &SampleGrid {
        &self.grid
    }

    /// Edge samples added on each side of a channel before filtering.
    pub fn pad(&self) -> usize {
        self.pad
    }

    /// Smooths one channel sampled at `timestamps` (the same ones passed to [`ChannelSmoother::new`]).
    pub fn smooth(&self, timestamps: &[f64], values: &[f64]) -> Vec<f64> {
        let resampled = self.grid.resample(timestamps, values);
        let filtered = self.filter.apply_zero_phase(&resampled, self.pad);
        self.grid.sample_at(&filtered, timestamps)
    }
}

/// One cutoff period per section keeps the edge transient out of the data,
/// capped at one grid length per section.
fn edge_padding(grid: &SampleGrid, smoothing: Smoothing) -> usize {
    let order = smoothing.filter_order;
    let cap = grid.len().saturating_mul(order).max(6 * order);
    let period = (grid.sampling_frequency / smoothing.cutoff_frequency).ceil();
    // `as` saturates for huge or non-finite periods.
    let period = if period.is_finite() { period as usize } else { usize::MAX };
    period.saturating_mul(order).max(6 * order).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_have_unit_dc_gain() {
        let filter = Butterworth::low_pass(4, 6.0, 120.0);
        assert_eq!(filter.order(), 4);
        for s in &filter.sections {
            let dc = s.gain * 4.0 / (1.0 - s.d1 - s.d2);
            assert!((dc - 1.0).abs() < 1e-12, "dc gain {dc}");
        }
    }

    #[test]
    fn constant_signal_is_untouched() {
        let filter = Butterworth::low_pass(6, 3.0, 60.0);
        let samples = vec![2.5; 50];
        for v in filter.apply_zero_phase(&samples, 10) {
            assert!((v - 2.5).abs() < 1e-9);
        }
    }

    #[test]
    fn high_frequency_is_attenuated_and_low_frequency_kept() {
        let fs = 200.0;
        let filter = Butterworth::low_pass(2, 5.0, fs);
        let n = 1000;
        let slow: Vec<f64> = (0..n).map(|k| (2.0 * PI * 1.0 * k as f64 / fs).sin()).collect();
        let fast: Vec<f64> = (0..n).map(|k| (2.0 * PI * 60.0 * k as f64 / fs).sin()).collect();

        let slow_out = filter.apply_zero_phase(&slow, 100);
        let fast_out = filter.apply_zero_phase(&fast, 100);

        let peak = |v: &[f64]| v[200..800].iter().fold(0.0f64, |m, x| m.max(x.abs()));
        assert!(peak(&slow_out) > 0.95, "slow peak {}", peak(&slow_out));
        assert!(peak(&fast_out) < 0.01, "fast peak {}", peak(&fast_out));
    }

    #[test]
    fn zero_phase_does_not_shift_a_symmetric_pulse() {
        let filter = Butterworth::low_pass(3, 4.0, 100.0);
        let mut pulse = vec![0.0; 201];
        pulse[100] = 1.0;
        let out = filter.apply_zero_phase(&pulse, 50);
        let argmax = out
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, v)| if *v > best.1 { (i, *v) } else { best })
            .0;
        assert_eq!(argmax, 100);
    }

    #[test]
    fn grid_follows_mean_frame_rate() {
        let timestamps = [0.0, 0.1, 0.2, 0.3, 0.4];
        let grid = SampleGrid::for_timestamps(&timestamps, 2).unwrap();
        assert!((grid.sampling_frequency - 20.0).abs() < 1e-9);
        assert_eq!(grid.len(), 9);
        assert!(SampleGrid::for_timestamps(&[1.0], 2).is_none());
        assert!(SampleGrid::for_timestamps(&[1.0, 1.0], 2).is_none());
    }

    #[test]
    fn resampling_round_trips_linear_data() {
        let times = [0.0, 0.1, 0.25, 0.3, 0.5];
        let values: Vec<f64> = times.iter().map(|t| 3.0 * t + 1.0).collect();
        let grid = SampleGrid::for_timestamps(&times, 4).unwrap();
        let resampled = grid.resample(&times, &values);
        let back = grid.sample_at(&resampled, &times);
        for (a, b) in values.iter().zip(back) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn passthrough_reasons() {
        let smoothing = Smoothing {
            cutoff_frequency: 0.0,
            filter_order: 2,
            samples_per_frame: 1,
        };
        let ts = [0.0, 1.0, 2.0];
        assert_eq!(
            ChannelSmoother::new(&ts, smoothing).unwrap_err(),
            Passthrough::Disabled
        );

        let smoothing = Smoothing {
            cutoff_frequency: 5.0,
            ..smoothing
        };
        assert_eq!(
            ChannelSmoother::new(&[0.0], smoothing).unwrap_err(),
            Passthrough::TooShort
        );
        // 1 Hz frames, 1 sample per frame: Nyquist is 0.5 Hz.
        assert!(matches!(
            ChannelSmoother::new(&ts, smoothing).unwrap_err(),
            Passthrough::AboveNyquist { .. }
        ));
    }

    fn frame_times(count: usize, fps: f64) -> Vec<f64> {
        (0..count).map(|i| i as f64 / fps).collect()
    }

    #[test]
    fn cutoff_below_the_sequence_length_is_passed_through() {
        let ts = frame_times(30, 30.0);
        for cutoff in [1e-300, 1e-4] {
            let smoothing = Smoothing {
                cutoff_frequency: cutoff,
                filter_order: 6,
                samples_per_frame: 2,
            };
            match ChannelSmoother::new(&ts, smoothing).unwrap_err() {
                Passthrough::BelowResolution { cutoff: c, lowest } => {
                    assert_eq!(c, cutoff);
                    assert!((lowest - 30.0 / 29.0).abs() < 1e-9, "lowest {lowest}");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn edge_padding_is_bounded_by_the_grid() {
        let ts = frame_times(30, 30.0);
        let smoothing = Smoothing {
            cutoff_frequency: 1.05,
            filter_order: 6,
            samples_per_frame: 2,
        };
        let smoother = ChannelSmoother::new(&ts, smoothing).unwrap();
        assert!(smoother.pad() <= smoother.grid().len() * 6, "pad {}", smoother.pad());

        let values: Vec<f64> = ts.iter().map(|t| (t * 7.0).sin()).collect();
        let out = smoother.smooth(&ts, &values);
        assert_eq!(out.len(), ts.len());
        assert!(out.iter().all(|v| v.is_finite()));

        let grid = SampleGrid::for_timestamps(&ts, 2).unwrap();
        let tiny = Smoothing {
            cutoff_frequency: 1e-300,
            ..smoothing
        };
        assert_eq!(edge_padding(&grid, tiny), grid.len() * 6);
        let closely_spaced = SampleGrid::for_timestamps(&[0.0, 1e-200, 2e-200], 2).unwrap();
        assert_eq!(edge_padding(&closely_spaced, smoothing), 36);
    }
}
