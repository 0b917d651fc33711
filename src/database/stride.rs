use serde::{Deserialize, Serialize};

use crate::error::{MotionMatchingError, Result};

use super::PoseIdentifier;

/// Where every animation's first frame sits in the flattened tables.
///
/// All per-frame tables of the database share this table, only their stride
/// differs. Every lookup goes through [`StrideTable::frame_index`], which is
/// the single place that clamps frames into their clip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StrideTable {
    frame_offsets: Vec<usize>,
    frame_counts: Vec<usize>,
}

impl StrideTable {
    pub fn from_frame_counts(frame_counts: &[usize]) -> Self {
        let mut frame_offsets = Vec::with_capacity(frame_counts.len());
        let mut offset = 0;
        for count in frame_counts {
            frame_offsets.push(offset);
            offset += count;
        }
        Self {
            frame_offsets,
            frame_counts: frame_counts.to_vec(),
        }
    }

    pub fn animation_count(&self) -> usize {
        self.frame_counts.len()
    }

    pub fn total_frames(&self) -> usize {
        self.frame_counts.iter().sum()
    }

    pub fn frame_count(&self, animation: usize) -> Result<usize> {
        self.frame_counts
            .get(animation)
            .copied()
            .ok_or(MotionMatchingError::UnknownAnimation {
                id: animation,
                count: self.frame_counts.len(),
            })
    }

    /// Global frame index of `id`, with the frame clamped to the clip.
    pub fn frame_index(&self, id: PoseIdentifier) -> Result<usize> {
        let count = self.frame_count(id.animation)?;
        let frame = id.frame.min(count.saturating_sub(1));
        let offset = self.frame_offsets.get(id.animation).ok_or(MotionMatchingError::StrideMismatch {
            table: "frame offset",
            expected: self.frame_counts.len(),
            actual: self.frame_offsets.len(),
        })?;
        Ok(offset + frame)
    }

    /// Flat element index for entry `index` of a group of `stride` entries.
    pub fn element_index(&self, id: PoseIdentifier, stride: usize, index: usize) -> Result<usize> {
        Ok(self.frame_index(id)? * stride + index)
    }
}

/// One fixed-size group of `T` per database frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTable<T> {
    stride: usize,
    data: Vec<T>,
}

impl<T> FrameTable<T> {
    pub fn new(stride: usize, data: Vec<T>) -> Self {
        Self { stride, data }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn group(&self, strides: &StrideTable, id: PoseIdentifier) -> Result<&[T]> {
        let start = strides.element_index(id, self.stride, 0)?;
        self.data
            .get(start..start + self.stride)
            .ok_or_else(|| self.mismatch(strides))
    }

    pub fn get(&self, strides: &StrideTable, id: PoseIdentifier, index: usize) -> Result<&T> {
        if index >= self.stride {
            return Err(MotionMatchingError::UnknownJoint {
                joint: index,
                count: self.stride,
            });
        }
        self.data
            .get(strides.element_index(id, self.stride, index)?)
            .ok_or_else(|| self.mismatch(strides))
    }

    fn mismatch(&self, strides: &StrideTable) -> MotionMatchingError {
        MotionMatchingError::StrideMismatch {
            table: "frame",
            expected: strides.total_frames() * self.stride,
            actual: self.data.len(),
        }
    }

    pub(crate) fn check(&self, table: &'static str, strides: &StrideTable) -> Result<()> {
        let expected = strides.total_frames() * self.stride;
        if self.data.len() != expected {
            return Err(MotionMatchingError::StrideMismatch {
                table,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}
