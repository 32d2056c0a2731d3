use crate::runtime_error::RuntimeError;

/// Log-scale latency axis.
///
/// Bucket 0 holds samples faster than the scale start, the last bucket holds
/// everything at or above `max_y` (and requests that never completed), and a
/// middle bucket k covers `[min_y + log_base^(k-1), min_y + log_base^k)`
/// milliseconds. The log spread keeps distributions spanning orders of
/// magnitude readable within a fixed number of rows.
#[derive(Debug, Clone, Copy)]
pub struct BucketScale {
    min_y: f64,
    max_y: f64,
    buckets: usize,
    log_base: f64,
    start_ms: f64,
}

impl BucketScale {
    pub fn new(min_y_ms: f64, max_y_ms: f64, buckets: usize) -> Result<Self, RuntimeError> {
        if buckets < 3 {
            return Err(RuntimeError::TooFewBuckets(buckets));
        }
        if !min_y_ms.is_finite() || !max_y_ms.is_finite() || max_y_ms <= min_y_ms {
            return Err(RuntimeError::InvalidAxis {
                min_y: min_y_ms,
                max_y: max_y_ms,
            });
        }

        let log_base = (max_y_ms - min_y_ms).powf(1.0 / (buckets as f64 - 2.0));
        Ok(Self {
            min_y: min_y_ms,
            max_y: max_y_ms,
            buckets,
            log_base,
            start_ms: min_y_ms + 1.0,
        })
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Upper edge of bucket 0.
    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    /// Bounds of a middle bucket, for axis labels.
    pub fn bounds_of(&self, bucket: usize) -> (f64, f64) {
        (
            self.min_y + self.log_base.powi(bucket as i32 - 1),
            self.min_y + self.log_base.powi(bucket as i32),
        )
    }

    /// Maps an elapsed time to its bucket. Total over all inputs and
    /// monotone; out-of-range intermediate values clamp into the edge
    /// buckets instead of escaping the axis.
    pub fn index_of(&self, elapsed_ms: f64) -> usize {
        if elapsed_ms >= self.max_y {
            return self.buckets - 1;
        }
        let corrected = elapsed_ms - self.start_ms;
        if corrected <= 0.0 {
            return 0;
        }

        let raw = (corrected.ln() / self.log_base.ln()).floor();
        if raw < 0.0 {
            0
        } else if raw >= (self.buckets - 1) as f64 {
            self.buckets - 1
        } else {
            (raw as usize + 1).min(self.buckets - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> BucketScale {
        BucketScale::new(0.0, 100.0, 10).unwrap()
    }

    #[test]
    fn it_maps_the_anchor_points() {
        let scale = scale();
        assert_eq!(scale.index_of(0.0), 0);
        assert_eq!(scale.index_of(0.5), 0);
        assert_eq!(scale.index_of(1.0), 0);
        assert_eq!(scale.index_of(1.5), 0);
        assert_eq!(scale.index_of(2.0), 1);
        assert_eq!(scale.index_of(5.0), 3);
        assert_eq!(scale.index_of(99.9), 8);
        assert_eq!(scale.index_of(100.0), 9);
        assert_eq!(scale.index_of(250.0), 9);
        assert_eq!(scale.index_of(f64::INFINITY), 9);
    }

    #[test]
    fn it_stays_in_bounds_and_monotone() {
        let scale = scale();
        let mut previous = 0;
        let mut elapsed = 0.0;
        while elapsed < 300.0 {
            let bucket = scale.index_of(elapsed);
            assert!(bucket < scale.buckets(), "bucket {bucket} for {elapsed}ms");
            assert!(
                bucket >= previous,
                "bucket fell from {previous} to {bucket} at {elapsed}ms"
            );
            previous = bucket;
            elapsed += 0.05;
        }
    }

    #[test]
    fn it_reports_label_bounds_around_each_middle_bucket() {
        let scale = scale();
        for bucket in 1..scale.buckets() - 1 {
            let (begin, end) = scale.bounds_of(bucket);
            assert!(begin < end);
            // the samples inside the bucket sit inside its label bounds,
            // give or take the one-millisecond start offset
            let probe = scale.start_ms() + (begin + end) / 2.0;
            assert_eq!(scale.index_of(probe), bucket);
        }
    }

    #[test]
    fn it_rejects_degenerate_configurations() {
        assert!(matches!(
            BucketScale::new(0.0, 100.0, 2),
            Err(RuntimeError::TooFewBuckets(2))
        ));
        assert!(matches!(
            BucketScale::new(10.0, 10.0, 10),
            Err(RuntimeError::InvalidAxis { .. })
        ));
        assert!(matches!(
            BucketScale::new(100.0, 10.0, 10),
            Err(RuntimeError::InvalidAxis { .. })
        ));
    }
}
