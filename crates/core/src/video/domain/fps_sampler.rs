/// Resamples a timestamped frame stream to a constant rate.
///
/// Each input frame at time `t` (seconds) lands in output slot
/// `round(t * fps)`. Output slots are filled with the most recent input
/// frame: a frame is repeated when the source is slower than the target and
/// dropped when a newer frame claims the same slot. The sampler holds one
/// pending frame and hands it back together with the number of slots it
/// fills once that number is known.
pub struct FpsSampler<T> {
    fps: f64,
    next_slot: Option<i64>,
    pending: Option<T>,
}

impl<T> FpsSampler<T> {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: f64::from(fps.max(1)),
            next_slot: None,
            pending: None,
        }
    }

    fn slot(&self, time: f64) -> i64 {
        (time * self.fps).round() as i64
    }

    /// Offers the next input frame.
    ///
    /// Returns the previously pending frame with its repeat count; a count
    /// of zero means it was dropped.
    pub fn push(&mut self, time: f64, item: T) -> Option<(T, u64)> {
        let slot = self.slot(time);
        let next = *self.next_slot.get_or_insert(slot);
        let emitted = self.pending.take().map(|prev| {
            let count = (slot - next).max(0) as u64;
            (prev, count)
        });
        if let Some((_, count)) = &emitted {
            self.next_slot = Some(next + *count as i64);
        }
        self.pending = Some(item);
        emitted
    }

    /// Flushes the pending frame, filling slots up to `round(end_time * fps)`.
    pub fn finish(&mut self, end_time: f64) -> Option<(T, u64)> {
        let prev = self.pending.take()?;
        let next = self.next_slot.unwrap_or(0);
        let count = (self.slot(end_time) - next).max(0) as u64;
        self.next_slot = Some(next + count as i64);
        Some((prev, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Runs `n` source frames at `src_fps` through a sampler at `dst_fps`
    /// and returns the source index of every output slot.
    fn resample(n: usize, src_fps: f64, dst_fps: u32) -> Vec<usize> {
        let mut sampler = FpsSampler::new(dst_fps);
        let mut out = Vec::new();
        let mut emit = |item: Option<(usize, u64)>| {
            if let Some((i, count)) = item {
                out.extend(std::iter::repeat(i).take(count as usize));
            }
        };
        for i in 0..n {
            emit(sampler.push(i as f64 / src_fps, i));
        }
        emit(sampler.finish(n as f64 / src_fps));
        out
    }

    #[test]
    fn test_same_rate_passes_every_frame_once() {
        assert_eq!(resample(48, 24.0, 24), (0..48).collect::<Vec<_>>());
    }

    #[test]
    fn test_lower_rate_drops_frames() {
        // Frames 0 and 1 share slot 0, frames 2..=4 share slot 1, and so on;
        // the latest frame in each slot wins.
        assert_eq!(resample(10, 30.0, 10), vec![1, 4, 7]);
    }

    #[test]
    fn test_double_rate_duplicates_frames() {
        assert_eq!(resample(3, 12.0, 24), vec![0, 0, 1, 1, 2, 2]);
    }

    #[rstest]
    #[case(48, 24.0, 24)]
    #[case(60, 30.0, 24)]
    #[case(300, 29.97, 24)]
    #[case(50, 25.0, 10)]
    #[case(24, 24.0, 60)]
    #[case(7, 1.0, 24)]
    #[case(1, 30.0, 24)]
    fn test_output_count_tracks_duration(#[case] n: usize, #[case] src_fps: f64, #[case] dst_fps: u32) {
        let duration = n as f64 / src_fps;
        let expected = (duration * f64::from(dst_fps)).floor() as i64;
        let actual = resample(n, src_fps, dst_fps).len() as i64;
        assert!(
            (actual - expected).abs() <= 1,
            "{n} frames @ {src_fps} -> {dst_fps}: got {actual}, expected {expected}±1"
        );
    }

    #[test]
    fn test_output_preserves_source_order() {
        let out = resample(100, 29.97, 24);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_nonzero_start_time_is_irrelevant() {
        let mut sampler = FpsSampler::new(24);
        let mut total = 0;
        for i in 0..24u64 {
            if let Some((_, count)) = sampler.push(10.0 + i as f64 / 24.0, i) {
                total += count;
            }
        }
        total += sampler.finish(11.0).map_or(0, |(_, c)| c);
        assert_eq!(total, 24);
    }

    #[test]
    fn test_finish_without_frames_is_none() {
        let mut sampler: FpsSampler<()> = FpsSampler::new(24);
        assert!(sampler.finish(2.0).is_none());
    }
}
