//! Linear load-cell calibration.

/// grams = gain_g_per_count * (raw - zero_counts) + offset_g
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightCalibration {
    pub gain_g_per_count: f32,
    pub zero_counts: i32,
    pub offset_g: f32,
}

impl WeightCalibration {
    pub fn to_grams(&self, raw: i32) -> f32 {
        let delta = i64::from(raw) - i64::from(self.zero_counts);
        self.gain_g_per_count * (delta as f32) + self.offset_g
    }
}
