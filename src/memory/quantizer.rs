// src/memory/quantizer.rs

//! Scalar quantization of embedding vectors into a single byte.
//!
//! Highly lossy by construction: the byte captures only the general
//! magnitude/direction of the vector and is meant for archival storage and
//! diagnostics. `dequantize` must never feed a retrieval path.

use tracing::debug;

/// Compresses an embedding into one byte.
///
/// For vectors with a meaningful average the average is scaled straight onto
/// [-128, 127]. Normalized embeddings average out near zero, so those fall
/// back to a range-based heuristic with a minimum-magnitude floor.
///
/// Panics on an empty vector: callers guarantee non-empty embeddings, so an
/// empty input is a programming error, not a data condition.
pub fn quantize(vector: &[f32]) -> i8 {
    assert!(!vector.is_empty(), "cannot quantize an empty embedding vector");

    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &value in vector {
        let v = value as f64;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    let average = sum / vector.len() as f64;

    if average.abs() < 0.001 {
        // Near-zero average: use the value range instead.
        let range = max - min;
        let mut scaled = if range > 0.0 {
            (average / range) * 127.0
        } else {
            0.0
        };

        // Still below the floor: substitute a minimum magnitude in the
        // direction of the average.
        if scaled.abs() < 1.0 {
            scaled = sign(average) * (range * 100.0).abs().min(10.0);
        }

        debug!(range, scaled, "quantizer: range-based path");
        return clamp_to_byte(scaled.round());
    }

    debug!(average, "quantizer: average-based path");
    clamp_to_byte((average * 127.0).round())
}

/// Reconstructs a vector by broadcasting `byte / 127.0` into every
/// dimension. Crude on purpose; usable only for rough magnitude comparison
/// and debugging.
pub fn dequantize(quantized: i8, dimensions: usize) -> Vec<f32> {
    let value = quantized as f32 / 127.0;
    vec![value; dimensions]
}

// f64::signum(0.0) is 1.0; the zero case must stay zero here.
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn clamp_to_byte(value: f64) -> i8 {
    value.clamp(-128.0, 127.0) as i8
}
