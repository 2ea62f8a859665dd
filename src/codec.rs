//! Decoder for the packed integer streams embedded in scene documents.
//!
//! Every UTF-16 code unit of a compressed string carries one zigzag encoded
//! delta. Multi component streams are stored lane-major: all X deltas, then
//! all Y deltas and so on, and each lane accumulates from zero.

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};

/// Zero point the encoder adds to every zigzag word.
const BIAS: i32 = 0x23;
/// Code units at or above this value were shifted up past the surrogate range.
const SHIFTED_START: i32 = 0xE000;
const SHIFT: i32 = 0x0800;

/// Turns a single code unit back into the signed delta it encodes.
pub fn unzip(unit: u16) -> i32 {
    let mut word = i32::from(unit);
    if word >= SHIFTED_START {
        word -= SHIFT;
    }
    word -= BIAS;
    (word >> 1) ^ -(word & 1)
}

/// Splits a compressed payload string into the code units the decoder reads.
pub fn code_units(payload: &str) -> Vec<u16> {
    payload.encode_utf16().collect()
}

/// Decodes a lane-major compressed stream into tuple-major floats.
///
/// Each output value is `(accumulated + offsets[lane]) * scales[lane]`.
pub fn decode_compressed(
    units: &[u16],
    lanes: usize,
    scales: &[f64],
    offsets: &[f64],
) -> Result<Vec<f32>> {
    if lanes == 0 {
        return Err(ImportError::malformed("compressed stream declares zero lanes"));
    }
    if scales.len() != lanes || offsets.len() != lanes {
        return Err(ImportError::malformed(format!(
            "expected {lanes} scales and offsets, found {} and {}",
            scales.len(),
            offsets.len()
        )));
    }
    if units.len() % lanes != 0 {
        return Err(ImportError::DecodeLengthMismatch {
            len: units.len(),
            lanes,
        });
    }

    let tuples = units.len() / lanes;
    let mut output = vec![0.0f32; units.len()];
    for lane in 0..lanes {
        let mut prev: i64 = 0;
        let column = &units[lane * tuples..(lane + 1) * tuples];
        for (tuple, unit) in column.iter().enumerate() {
            prev += i64::from(unzip(*unit));
            let value = (prev as f64 + offsets[lane]) * scales[lane];
            output[tuple * lanes + lane] = value as f32;
        }
    }
    Ok(output)
}

/// Accumulated unsigned values together with the storage width they were
/// allocated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBuffer {
    pub format: IndexFormat,
    pub values: Vec<u32>,
}

impl IndexBuffer {
    /// Wraps raw values, choosing the storage width from `capacity_hint`.
    pub fn from_raw(values: Vec<u32>, capacity_hint: usize) -> Self {
        Self {
            format: IndexFormat::for_capacity(capacity_hint),
            values,
        }
    }

    /// Number of decoded indices.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the stream decoded no indices.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Decodes a single lane of accumulated unsigned indices.
///
/// `capacity_hint` picks the storage width; decoded values are not bounded by it.
pub fn decode_indices(units: &[u16], capacity_hint: usize) -> IndexBuffer {
    let mut values = Vec::with_capacity(units.len());
    let mut prev: i64 = 0;
    for unit in units {
        prev += i64::from(unzip(*unit));
        values.push(prev as u32);
    }
    IndexBuffer::from_raw(values, capacity_hint)
}

/// Storage width a renderer should use for an index stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexFormat {
    U8,
    U16,
    U32,
}

impl IndexFormat {
    /// Picks the narrowest format able to address `capacity` distinct values.
    pub fn for_capacity(capacity: usize) -> Self {
        if capacity < 1 << 8 {
            Self::U8
        } else if capacity < 1 << 16 {
            Self::U16
        } else {
            Self::U32
        }
    }

    /// Bytes per index in this format.
    pub fn byte_size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}
