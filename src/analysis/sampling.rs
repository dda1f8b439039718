//! Choice of which frames of a video get analyzed.

use super::frame_source::VideoInfo;

/// Bounds on the number of sampled frames.
#[derive(Debug, Clone, Copy)]
pub struct SamplingLimits {
    pub max_samples: usize,
    pub min_samples: usize,
}

impl Default for SamplingLimits {
    fn default() -> Self {
        Self {
            max_samples: 100,
            min_samples: 5,
        }
    }
}

/// Distance between sampled frames, scaled with the video length.
pub fn sampling_interval(info: &VideoInfo) -> u64 {
    let seconds_between = match info.duration {
        d if d <= 10.0 => 0.5,
        d if d <= 30.0 => 1.0,
        d if d <= 60.0 => 2.0,
        d if d <= 120.0 => 3.0,
        d if d <= 300.0 => 4.0,
        _ => 6.0,
    };
    ((info.fps * seconds_between) as u64).max(1)
}

/// Sorted, unique frame indices to analyze. Always contains the last frame
/// unless thinning drops it.
pub fn sample_frame_indices(info: &VideoInfo, limits: SamplingLimits) -> Vec<u64> {
    let total = info.frame_count;
    if total == 0 {
        return Vec::new();
    }

    let interval = sampling_interval(info);
    let mut indices: Vec<u64> = (0..total).step_by(interval as usize).collect();
    if indices.last() != Some(&(total - 1)) {
        indices.push(total - 1);
    }

    let max_samples = limits.max_samples.max(1);
    if indices.len() > max_samples {
        let step = indices.len() / max_samples;
        indices = indices
            .into_iter()
            .step_by(step)
            .take(max_samples)
            .collect();
    }

    if indices.len() < limits.min_samples {
        indices = spread_indices(total, limits.min_samples);
    }

    indices.retain(|idx| *idx < total);
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// `count` indices spread over `[0, total)`, first and last included.
fn spread_indices(total: u64, count: usize) -> Vec<u64> {
    if count <= 1 {
        return vec![0];
    }
    let parts = (count - 1) as u64;
    let mut indices: Vec<u64> = (0..parts).map(|i| i * total / parts).collect();
    indices.push(total - 1);
    indices
}

/// Neighbours tried, in order, when a frame cannot be decoded.
pub fn fallback_indices(index: u64, total: u64) -> Vec<u64> {
    let mut candidates = vec![index];
    if index > 0 {
        candidates.push(index - 1);
    }
    if index + 1 < total {
        candidates.push(index + 1);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(frame_count: u64, fps: f64) -> VideoInfo {
        VideoInfo {
            frame_count,
            fps,
            width: 640,
            height: 480,
            duration: frame_count as f64 / fps,
        }
    }

    #[test]
    fn interval_grows_with_duration() {
        assert_eq!(sampling_interval(&info(300, 30.0)), 15); // 10s
        assert_eq!(sampling_interval(&info(900, 30.0)), 30); // 30s
        assert_eq!(sampling_interval(&info(1800, 30.0)), 60); // 60s
        assert_eq!(sampling_interval(&info(3600, 30.0)), 90); // 120s
        assert_eq!(sampling_interval(&info(9000, 30.0)), 120); // 300s
        assert_eq!(sampling_interval(&info(18000, 30.0)), 180); // 600s
        assert_eq!(sampling_interval(&info(10, 1.0)), 1);
    }

    #[test]
    fn ten_second_clip_samples_every_half_second() {
        let indices = sample_frame_indices(&info(300, 30.0), SamplingLimits::default());
        assert_eq!(indices.first(), Some(&0));
        assert_eq!(indices.last(), Some(&299));
        assert_eq!(indices.len(), 21);
        assert_eq!(indices[1], 15);
    }

    #[test]
    fn long_videos_are_thinned_to_the_maximum() {
        // 3600 seconds at 30fps, one sample every 6s => 601 candidates.
        let indices = sample_frame_indices(&info(108_000, 30.0), SamplingLimits::default());
        assert_eq!(indices.len(), 100);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn short_videos_get_the_minimum_spread() {
        // 3 frames: every index already sampled but fewer than 5 samples.
        let indices = sample_frame_indices(&info(3, 1.0), SamplingLimits::default());
        assert_eq!(indices, vec![0, 1, 2]);

        let indices = sample_frame_indices(&info(40, 10.0), SamplingLimits::default());
        assert_eq!(indices, vec![0, 5, 10, 15, 20, 25, 30, 35, 39]);

        let indices = sample_frame_indices(
            &info(40, 2.0),
            SamplingLimits {
                max_samples: 100,
                min_samples: 5,
            },
        );
        // 20s at 2fps samples every 2 frames, which is plenty.
        assert_eq!(indices.len(), 21);
    }

    #[test]
    fn minimum_spread_uses_quarters() {
        let limits = SamplingLimits {
            max_samples: 3,
            min_samples: 5,
        };
        let indices = sample_frame_indices(&info(100, 1.0), limits);
        assert_eq!(indices, vec![0, 25, 50, 75, 99]);
    }

    #[test]
    fn fallbacks_stay_in_range() {
        assert_eq!(fallback_indices(0, 10), vec![0, 1]);
        assert_eq!(fallback_indices(9, 10), vec![9, 8]);
        assert_eq!(fallback_indices(4, 10), vec![4, 3, 5]);
        assert_eq!(fallback_indices(0, 1), vec![0]);
    }
}
