//! Progress math for one job: ffmpeg output parsing, weighted aggregation
//! across the rendition ladder, and write coalescing so the job store sees
//! at most one update per whole-percent step instead of one per log line.

/// Parses an ffmpeg progress line into elapsed seconds of output.
///
/// Accepts both the `-progress pipe:1` key/value form (`out_time_us=` /
/// `out_time_ms=`, both microseconds) and the classic stats form
/// (`time=HH:MM:SS.cc`) so the parser keeps working regardless of which
/// stream the encoder implementation taps.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let line = line.trim();

    for key in ["out_time_us=", "out_time_ms="] {
        if let Some(raw) = line.strip_prefix(key) {
            let us: i64 = raw.trim().parse().ok()?;
            if us < 0 {
                return None;
            }
            return Some(us as f64 / 1_000_000.0);
        }
    }

    if let Some(idx) = line.find("time=") {
        let raw = &line[idx + 5..];
        let raw = raw.split_whitespace().next()?;
        let mut parts = raw.split(':');
        let hours: f64 = parts.next()?.parse().ok()?;
        let minutes: f64 = parts.next()?.parse().ok()?;
        let seconds: f64 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        return Some(hours * 3600.0 + minutes * 60.0 + seconds);
    }

    None
}

/// Weighted overall progress for a job. Each selected tier contributes
/// `1/len(selected)` of the total, scaled by its own fractional completion.
#[derive(Debug)]
pub struct ProgressAggregator {
    total_tiers: usize,
    completed_tiers: usize,
    last_reported: f32,
}

impl ProgressAggregator {
    pub fn new(total_tiers: usize) -> Self {
        Self {
            total_tiers: total_tiers.max(1),
            completed_tiers: 0,
            last_reported: 0.0,
        }
    }

    pub fn tier_completed(&mut self) {
        if self.completed_tiers < self.total_tiers {
            self.completed_tiers += 1;
        }
    }

    /// Overall percentage given the in-flight tier's fraction (0.0..=1.0).
    /// Clamped to [0, 100] and never below the last reported value, which
    /// guards against out-of-order completion reports.
    pub fn overall(&self, current_tier_fraction: f64) -> f32 {
        let fraction = current_tier_fraction.clamp(0.0, 1.0);
        let done = self.completed_tiers as f64;
        let pct = ((done + fraction) / self.total_tiers as f64) * 100.0;
        (pct as f32).clamp(0.0, 100.0).max(self.last_reported)
    }

    /// Returns the percentage to persist if it advanced at least one whole
    /// point past the last persisted value, otherwise None.
    pub fn coalesce(&mut self, current_tier_fraction: f64) -> Option<f32> {
        let pct = self.overall(current_tier_fraction);
        if pct >= self.last_reported + 1.0 || (pct >= 100.0 && self.last_reported < 100.0) {
            self.last_reported = pct;
            Some(pct)
        } else {
            None
        }
    }
}

/// External reporting rounds to the nearest integer; storage keeps the float.
pub fn display_percentage(progress: f32) -> u8 {
    progress.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_out_time_us() {
        assert_eq!(parse_progress_line("out_time_us=90500000"), Some(90.5));
        assert_eq!(parse_progress_line("out_time_ms=1500000"), Some(1.5));
        assert_eq!(parse_progress_line("out_time_us=-1"), None);
    }

    #[test]
    fn parses_classic_time_stat() {
        let line = "frame= 2406 fps=144 q=28.0 size=   12800KiB time=00:01:40.25 bitrate=1045.6kbits/s";
        let secs = parse_progress_line(line).unwrap();
        assert!((secs - 100.25).abs() < 1e-9);
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert_eq!(parse_progress_line("progress=continue"), None);
        assert_eq!(parse_progress_line("frame=10 fps=0.0"), None);
        assert_eq!(parse_progress_line("time=bogus"), None);
    }

    #[test]
    fn weights_tiers_equally() {
        let mut agg = ProgressAggregator::new(4);
        assert_eq!(agg.overall(0.0), 0.0);
        assert_eq!(agg.overall(0.5), 12.5);

        agg.tier_completed();
        assert_eq!(agg.overall(0.0), 25.0);
        agg.tier_completed();
        agg.tier_completed();
        agg.tier_completed();
        assert_eq!(agg.overall(0.0), 100.0);
    }

    #[test]
    fn never_decreases_on_out_of_order_fractions() {
        let mut agg = ProgressAggregator::new(2);
        assert_eq!(agg.coalesce(0.9), Some(45.0));
        // A stale, lower fraction must not move the needle backwards.
        assert_eq!(agg.overall(0.2), 45.0);
        assert_eq!(agg.coalesce(0.2), None);
    }

    #[test]
    fn coalesces_sub_percent_updates() {
        let mut agg = ProgressAggregator::new(1);
        assert_eq!(agg.coalesce(0.005), None);
        assert_eq!(agg.coalesce(0.012), Some(1.2));
        assert_eq!(agg.coalesce(0.0121), None);
        assert_eq!(agg.coalesce(1.0), Some(100.0));
        // Terminal value reported exactly once.
        assert_eq!(agg.coalesce(1.0), None);
    }

    #[test]
    fn clamps_fraction_overshoot() {
        let agg = ProgressAggregator::new(2);
        assert_eq!(agg.overall(1.7), 50.0);
    }

    #[test]
    fn rounds_for_display() {
        assert_eq!(display_percentage(99.4), 99);
        assert_eq!(display_percentage(99.5), 100);
        assert_eq!(display_percentage(-3.0), 0);
        assert_eq!(display_percentage(140.0), 100);
    }
}
