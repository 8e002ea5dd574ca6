use serde::{Deserialize, Serialize};

const ZERO_TOLERANCE: f32 = 1e-6;

/// The m/z × rt window a group was extracted from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MzSlice {
    pub mzmin: f32,
    pub mzmax: f32,
    pub rtmin: f32,
    pub rtmax: f32,
}

impl MzSlice {
    pub fn new(mzmin: f32, mzmax: f32, rtmin: f32, rtmax: f32) -> Self {
        MzSlice { mzmin, mzmax, rtmin, rtmax }
    }

    /// Both bounds close to zero in either the m/z or the rt dimension.
    pub fn is_zero(&self) -> bool {
        let near_zero = |v: f32| v.abs() <= ZERO_TOLERANCE;
        (near_zero(self.mzmin) && near_zero(self.mzmax))
            || (near_zero(self.rtmin) && near_zero(self.rtmax))
    }
}
