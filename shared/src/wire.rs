/*!
Bit-level wire primitives for physics state replication.

# Model
- The stream is LSB-first within each byte: the first bit written lands in
  bit 0 of byte 0.
- Floats are written as raw IEEE-754 bits (exact round-trip); rotations use
  the smallest-three quantization below.

# Rotation encoding
A unit quaternion is encoded in 32 bits:
- 2 bits  : index of the largest-magnitude component (dropped from the wire)
- 3 x 10 bits : the remaining components, quantized over [-1/sqrt(2), 1/sqrt(2)]

The dropped component is reconstructed from the unit-length constraint. The
quaternion is negated before encoding if the dropped component is negative
(q and -q are the same rotation), so reconstruction can always take the
positive root.

Treat all of this as a wire format: changing widths or ordering is a
protocol break between server and client builds.
*/

use crate::math::{Quat, Vec3};
use nalgebra as na;

/// Quantization half-range for the three transmitted quaternion components.
const QUAT_COMPONENT_MAX: f32 = std::f32::consts::FRAC_1_SQRT_2;
const QUAT_COMPONENT_BITS: u32 = 10;

/// Append-only bit stream writer.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    /// Number of bits written so far.
    len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.len
    }

    /// Finish writing and return the backing bytes (final partial byte
    /// zero-padded).
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_bool(&mut self, value: bool) {
        let byte = self.len / 8;
        let bit = self.len % 8;
        if bit == 0 {
            self.bytes.push(0);
        }
        if value {
            self.bytes[byte] |= 1 << bit;
        }
        self.len += 1;
    }

    /// Write the low `bits` bits of `value`, LSB first.
    pub fn write_bits(&mut self, value: u32, bits: u32) {
        debug_assert!(bits <= 32);
        for i in 0..bits {
            self.write_bool((value >> i) & 1 == 1);
        }
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_bits(value.to_bits(), 32);
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    /// Smallest-three compressed quaternion (32 bits total).
    pub fn write_quat(&mut self, value: Quat) {
        let mut q = [value.i, value.j, value.k, value.w];

        let mut largest = 0;
        for i in 1..4 {
            if q[i].abs() > q[largest].abs() {
                largest = i;
            }
        }
        // q and -q encode the same rotation; keep the dropped component
        // positive so the reader can take the positive root.
        if q[largest] < 0.0 {
            for c in &mut q {
                *c = -*c;
            }
        }

        self.write_bits(largest as u32, 2);
        for (i, c) in q.iter().enumerate() {
            if i != largest {
                self.write_bits(quantize_snorm(*c, QUAT_COMPONENT_MAX, QUAT_COMPONENT_BITS), QUAT_COMPONENT_BITS);
            }
        }
    }
}

/// Sequential bit stream reader over a byte slice.
pub struct BitReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    /// Reads past the end return `false`/zero; replication code treats a
    /// truncated stream as "nothing further changed".
    pub fn read_bool(&mut self) -> bool {
        let byte = self.cursor / 8;
        let bit = self.cursor % 8;
        self.cursor += 1;
        match self.bytes.get(byte) {
            Some(b) => (b >> bit) & 1 == 1,
            None => false,
        }
    }

    pub fn read_bits(&mut self, bits: u32) -> u32 {
        debug_assert!(bits <= 32);
        let mut value = 0u32;
        for i in 0..bits {
            if self.read_bool() {
                value |= 1 << i;
            }
        }
        value
    }

    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_bits(32))
    }

    pub fn read_vec3(&mut self) -> Vec3 {
        Vec3::new(self.read_f32(), self.read_f32(), self.read_f32())
    }

    pub fn read_quat(&mut self) -> Quat {
        let largest = self.read_bits(2) as usize;

        let mut q = [0.0f32; 4];
        let mut sum_sq = 0.0f32;
        for (i, c) in q.iter_mut().enumerate() {
            if i != largest {
                *c = dequantize_snorm(
                    self.read_bits(QUAT_COMPONENT_BITS),
                    QUAT_COMPONENT_MAX,
                    QUAT_COMPONENT_BITS,
                );
                sum_sq += *c * *c;
            }
        }
        q[largest] = (1.0 - sum_sq).max(0.0).sqrt();

        Quat::from_quaternion(na::Quaternion::new(q[3], q[0], q[1], q[2]))
    }
}

/// Quantize `x` from [-max, max] into an unsigned code of `bits` bits.
#[inline]
fn quantize_snorm(x: f32, max: f32, bits: u32) -> u32 {
    let levels = (1u32 << bits) - 1;
    let t = ((x / max) * 0.5 + 0.5).clamp(0.0, 1.0);
    (t * levels as f32).round() as u32
}

/// Inverse of [`quantize_snorm`].
#[inline]
fn dequantize_snorm(code: u32, max: f32, bits: u32) -> f32 {
    let levels = (1u32 << bits) - 1;
    ((code as f32 / levels as f32) * 2.0 - 1.0) * max
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra as na;

    #[test]
    fn bools_round_trip_across_byte_boundaries() {
        let pattern: Vec<bool> = (0..19).map(|i| i % 3 == 0).collect();

        let mut w = BitWriter::new();
        for &b in &pattern {
            w.write_bool(b);
        }
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        for &b in &pattern {
            assert_eq!(r.read_bool(), b);
        }
    }

    #[test]
    fn unaligned_bits_round_trip() {
        let mut w = BitWriter::new();
        w.write_bool(true); // push everything off byte alignment
        w.write_bits(0x2AB, 12);
        w.write_bits(3, 2);
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        assert!(r.read_bool());
        assert_eq!(r.read_bits(12), 0x2AB);
        assert_eq!(r.read_bits(2), 3);
    }

    #[test]
    fn f32_round_trip_is_exact() {
        let values = [0.0f32, -1.5, 1234.5678, f32::MIN_POSITIVE, -0.0];
        let mut w = BitWriter::new();
        for &v in &values {
            w.write_f32(v);
        }
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        for &v in &values {
            assert_eq!(r.read_f32().to_bits(), v.to_bits());
        }
    }

    #[test]
    fn quat_round_trip_within_quantization_error() {
        let samples = [
            Quat::identity(),
            Quat::from_axis_angle(&na::Vector3::x_axis(), 0.3),
            Quat::from_axis_angle(&na::Vector3::y_axis(), -2.8),
            Quat::from_axis_angle(&na::Vector3::z_axis(), std::f32::consts::PI),
            Quat::from_euler_angles(0.5, -1.0, 2.0),
        ];

        for q in samples {
            let mut w = BitWriter::new();
            w.write_quat(q);
            let bytes = w.into_bytes();

            let decoded = BitReader::new(&bytes).read_quat();
            // 10 bits per component keeps angular error well under half a degree.
            assert!(q.angle_to(&decoded) < 0.01, "error too large for {q:?}");
        }
    }

    #[test]
    fn reading_past_the_end_yields_zero() {
        let mut r = BitReader::new(&[]);
        assert!(!r.read_bool());
        assert_eq!(r.read_bits(10), 0);
    }

    #[test]
    fn quat_encoding_is_32_bits() {
        let mut w = BitWriter::new();
        w.write_quat(Quat::from_euler_angles(0.1, 0.2, 0.3));
        assert_eq!(w.bit_len(), 32);
    }
}
