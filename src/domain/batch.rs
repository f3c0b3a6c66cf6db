// ============================================================
// Layer 3 — Frames and Batch Domain Types
// ============================================================
// `Frames` is a rectangular block of zero-padded beats:
//
//   shape = [rows, max_len, n_channels]
//   data  = row-major flat Vec<f32>
//
//   row 0: |s0 s1 s2 s3 s4 s5 0  0 |   ← beat padded to max_len
//   row 1: |s0 s1 s2 s3 0  0  0  0 |
//   row 2: |s0 s1 s2 s3 s4 s5 s6 s7|
//
// A Batch stacks the Frames of every lane, one block of
// (n_frames + overlap) rows per lane, plus the length vectors
// the recurrent stages need.

use std::ops::Range;

/// Zero-padded `[rows, max_len, n_channels]` tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Frames {
    data:  Vec<f32>,
    shape: [usize; 3],
}

impl Frames {
    /// All-zero frames of the given shape.
    pub fn zeros(rows: usize, max_len: usize, n_channels: usize) -> Self {
        Self {
            data:  vec![0.0; rows * max_len * n_channels],
            shape: [rows, max_len, n_channels],
        }
    }

    /// Wrap an existing flat buffer. Returns None if the length is wrong.
    pub fn from_vec(data: Vec<f32>, shape: [usize; 3]) -> Option<Self> {
        (data.len() == shape.iter().product::<usize>()).then_some(Self { data, shape })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn max_len(&self) -> usize {
        self.shape[1]
    }

    pub fn n_channels(&self) -> usize {
        self.shape[2]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Flat offset of sample `t`, channel `c` in row `row`
    fn offset(&self, row: usize, t: usize, c: usize) -> usize {
        (row * self.shape[1] + t) * self.shape[2] + c
    }

    pub fn get(&self, row: usize, t: usize, c: usize) -> f32 {
        self.data[self.offset(row, t, c)]
    }

    pub fn set(&mut self, row: usize, t: usize, c: usize, value: f32) {
        let i = self.offset(row, t, c);
        self.data[i] = value;
    }

    /// One row as `[max_len * n_channels]`, time-major.
    pub fn row(&self, row: usize) -> &[f32] {
        let width = self.shape[1] * self.shape[2];
        &self.data[row * width..(row + 1) * width]
    }

    /// The first `len` samples of one row, split per channel.
    pub fn row_channels(&self, row: usize, len: usize) -> Vec<Vec<f32>> {
        let len = len.min(self.shape[1]);
        (0..self.shape[2])
            .map(|c| (0..len).map(|t| self.get(row, t, c)).collect())
            .collect()
    }

    /// Copy `src` rows into `self` starting at row `dst_row`,
    /// left-aligned in time. The rest of each destination row is untouched.
    pub fn copy_rows_from(&mut self, dst_row: usize, src: &Frames, rows: Range<usize>) {
        debug_assert_eq!(self.shape[2], src.shape[2]);
        debug_assert!(src.shape[1] <= self.shape[1]);
        let src_width = src.shape[1] * src.shape[2];
        for (k, r) in rows.enumerate() {
            let from = &src.data[r * src_width..(r + 1) * src_width];
            let start = self.offset(dst_row + k, 0, 0);
            self.data[start..start + src_width].copy_from_slice(from);
        }
    }
}

/// One training mini-batch assembled from every lane.
///
/// `raw`, `delta` and `events` are populated iff the matching
/// `want_*` flag was set; the length vectors are always present.
/// Model code may rely on whichever tensor it was configured for.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Raw signal, `[lanes * beats_per_window, max_len, n_channels]`
    pub raw: Option<Frames>,

    /// Delta-coded signal, same shape as `raw`
    pub delta: Option<Frames>,

    /// Per-beat labels, `[lanes * beats_per_window][n_required_diseases]`
    pub events: Option<Vec<Vec<f32>>>,

    /// Padded length of every row, each a multiple of the reduction ratio
    pub sequence_length: Vec<usize>,

    /// Unpadded length of every row
    pub true_length: Vec<usize>,

    /// n_frames + overlap
    pub beats_per_window: usize,

    /// Number of lanes (windows) in the batch
    pub lanes: usize,
}

impl Batch {
    /// Total number of beat rows
    pub fn rows(&self) -> usize {
        self.sequence_length.len()
    }

    /// Largest padded length in the batch
    pub fn max_len(&self) -> usize {
        self.sequence_length.iter().copied().max().unwrap_or(0)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Frames::from_vec(vec![0.0; 12], [2, 3, 2]).is_some());
        assert!(Frames::from_vec(vec![0.0; 11], [2, 3, 2]).is_none());
    }

    #[test]
    fn test_copy_rows_is_left_aligned() {
        let mut src = Frames::zeros(2, 2, 1);
        src.set(0, 0, 0, 1.0);
        src.set(0, 1, 0, 2.0);
        src.set(1, 0, 0, 3.0);

        let mut dst = Frames::zeros(4, 4, 1);
        dst.copy_rows_from(2, &src, 0..2);

        assert_eq!(dst.row(2), &[1.0, 2.0, 0.0, 0.0]);
        assert_eq!(dst.row(3), &[3.0, 0.0, 0.0, 0.0]);
        assert_eq!(dst.row(0), &[0.0; 4]);
    }

    #[test]
    fn test_row_channels_crops_to_length() {
        let mut f = Frames::zeros(1, 4, 2);
        f.set(0, 0, 1, 7.0);
        f.set(0, 2, 0, 9.0);
        let chans = f.row_channels(0, 3);
        assert_eq!(chans, vec![vec![0.0, 0.0, 9.0], vec![7.0, 0.0, 0.0]]);
    }
}
