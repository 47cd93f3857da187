//! Wire format shared with the drilling simulator.
//!
//! Both directions are a bare array of little-endian IEEE-754 doubles, no
//! header and no checksum. The datagram length is the only framing.
//!
//! ```text
//! command (controller → simulator), 48 bytes
//! ┌───────┬──────┬──────┬──────┬──────┬────────┐
//! │ cycle │ z_a  │ z_b  │ w_a  │ w_b  │ energy │
//! └───────┴──────┴──────┴──────┴──────┴────────┘
//!
//! measurement (simulator → controller), 96 bytes
//! ┌───┬───────┬───────┬─────┬───────┬────────┬───────┬─────────┬─────┬─────┬─────┬─────┐
//! │ t │ cycle │ p_ref │ p   │ p_stp │ q_pump │ q_bit │ q_choke │ z_a │ z_b │ w_a │ w_b │
//! └───┴───────┴───────┴─────┴───────┴────────┴───────┴─────────┴─────┴─────┴─────┴─────┘
//! ```
//!
//! Values are not range-checked. NaN and infinities decode as-is.

use std::fmt;

use thiserror::Error;

/// Size of one encoded field.
pub const FIELD_SIZE: usize = std::mem::size_of::<f64>();

/// Number of fields in a command datagram.
pub const COMMAND_FIELDS: usize = 6;

/// Number of fields in a measurement datagram.
pub const MEASUREMENT_FIELDS: usize = 12;

/// Encoded command length in bytes.
pub const COMMAND_LEN: usize = COMMAND_FIELDS * FIELD_SIZE;

/// Encoded measurement length in bytes.
pub const MEASUREMENT_LEN: usize = MEASUREMENT_FIELDS * FIELD_SIZE;

/// Errors decoding a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Datagram length does not match the fixed frame size.
    #[error("wrong frame length: expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Command sent to the simulator once per advanced cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CommandFrame {
    /// Cycle this command answers. Carried as a double on the wire.
    pub cycle_index: f64,
    pub setpoint_a: f64,
    pub setpoint_b: f64,
    pub weight_a: f64,
    pub weight_b: f64,
    pub control_energy: f64,
}

impl CommandFrame {
    /// Fields in wire order.
    #[must_use]
    pub const fn to_fields(&self) -> [f64; COMMAND_FIELDS] {
        [
            self.cycle_index,
            self.setpoint_a,
            self.setpoint_b,
            self.weight_a,
            self.weight_b,
            self.control_energy,
        ]
    }

    #[must_use]
    pub const fn from_fields(f: [f64; COMMAND_FIELDS]) -> Self {
        Self {
            cycle_index: f[0],
            setpoint_a: f[1],
            setpoint_b: f[2],
            weight_a: f[3],
            weight_b: f[4],
            control_energy: f[5],
        }
    }
}

/// Snapshot reported by the simulator every step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasurementFrame {
    /// Simulation time in seconds.
    pub sim_time: f64,
    pub cycle_index: f64,
    /// Choke pressure reference.
    pub reference_pressure: f64,
    /// Measured choke pressure.
    pub pressure: f64,
    pub standpipe_pressure: f64,
    pub pump_rate: f64,
    /// Flow through the bit.
    pub bit_rate: f64,
    /// Flow through the choke.
    pub choke_rate: f64,
    /// Setpoints as applied by the simulator (echo of the last command).
    pub setpoint_a: f64,
    pub setpoint_b: f64,
    /// Actuator positions as measured.
    pub actuator_a: f64,
    pub actuator_b: f64,
}

impl MeasurementFrame {
    /// Fields in wire order.
    #[must_use]
    pub const fn to_fields(&self) -> [f64; MEASUREMENT_FIELDS] {
        [
            self.sim_time,
            self.cycle_index,
            self.reference_pressure,
            self.pressure,
            self.standpipe_pressure,
            self.pump_rate,
            self.bit_rate,
            self.choke_rate,
            self.setpoint_a,
            self.setpoint_b,
            self.actuator_a,
            self.actuator_b,
        ]
    }

    #[must_use]
    pub const fn from_fields(f: [f64; MEASUREMENT_FIELDS]) -> Self {
        Self {
            sim_time: f[0],
            cycle_index: f[1],
            reference_pressure: f[2],
            pressure: f[3],
            standpipe_pressure: f[4],
            pump_rate: f[5],
            bit_rate: f[6],
            choke_rate: f[7],
            setpoint_a: f[8],
            setpoint_b: f[9],
            actuator_a: f[10],
            actuator_b: f[11],
        }
    }

    /// Cycle index as an integer, truncated toward zero.
    ///
    /// NaN maps to 0 and out-of-range values saturate, so a garbage index can
    /// never look like a cycle advance past `i64::MAX`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cycle(&self) -> i64 {
        self.cycle_index as i64
    }
}

impl fmt::Display for MeasurementFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:.4}, cycle={}, p_ref={:.4}, p={:.4}, p_stp={:.4}, q_pump={:.4}, \
             q_bit={:.4}, q_choke={:.4}, z_a={:.4}, z_b={:.4}, w_a={:.4}, w_b={:.4}",
            self.sim_time,
            self.cycle(),
            self.reference_pressure,
            self.pressure,
            self.standpipe_pressure,
            self.pump_rate,
            self.bit_rate,
            self.choke_rate,
            self.setpoint_a,
            self.setpoint_b,
            self.actuator_a,
            self.actuator_b,
        )
    }
}

/// Writes doubles into a fixed output buffer.
struct FieldWriter<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    fn put_f64(&mut self, v: f64) {
        self.buf[self.cursor..self.cursor + FIELD_SIZE].copy_from_slice(&v.to_le_bytes());
        self.cursor += FIELD_SIZE;
    }
}

/// Reads doubles from a buffer whose length was checked up front.
struct FieldReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8], expected: usize) -> Result<Self, FrameError> {
        if buf.len() != expected {
            return Err(FrameError::WrongLength {
                expected,
                actual: buf.len(),
            });
        }
        Ok(Self { buf, cursor: 0 })
    }

    fn take_f64(&mut self) -> f64 {
        let mut arr = [0u8; FIELD_SIZE];
        arr.copy_from_slice(&self.buf[self.cursor..self.cursor + FIELD_SIZE]);
        self.cursor += FIELD_SIZE;
        f64::from_le_bytes(arr)
    }

    fn take_fields<const F: usize>(&mut self) -> [f64; F] {
        std::array::from_fn(|_| self.take_f64())
    }
}

/// Encode a command datagram.
#[must_use]
pub fn encode_command(frame: &CommandFrame) -> [u8; COMMAND_LEN] {
    let mut out = [0u8; COMMAND_LEN];
    let mut w = FieldWriter::new(&mut out);
    for v in frame.to_fields() {
        w.put_f64(v);
    }
    out
}

/// Decode a command datagram.
///
/// The controller never receives commands; this is the reference decoder for
/// the simulator side and for tests.
///
/// # Errors
///
/// [`FrameError::WrongLength`] unless `bytes` is exactly [`COMMAND_LEN`] long.
pub fn decode_command(bytes: &[u8]) -> Result<CommandFrame, FrameError> {
    let mut r = FieldReader::new(bytes, COMMAND_LEN)?;
    Ok(CommandFrame::from_fields(r.take_fields()))
}

/// Encode a measurement datagram, as the simulator would.
#[must_use]
pub fn encode_measurement(frame: &MeasurementFrame) -> [u8; MEASUREMENT_LEN] {
    let mut out = [0u8; MEASUREMENT_LEN];
    let mut w = FieldWriter::new(&mut out);
    for v in frame.to_fields() {
        w.put_f64(v);
    }
    out
}

/// Decode a measurement datagram.
///
/// # Errors
///
/// [`FrameError::WrongLength`] unless `bytes` is exactly [`MEASUREMENT_LEN`] long.
pub fn decode_measurement(bytes: &[u8]) -> Result<MeasurementFrame, FrameError> {
    let mut r = FieldReader::new(bytes, MEASUREMENT_LEN)?;
    Ok(MeasurementFrame::from_fields(r.take_fields()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_doubles(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn frame_sizes() {
        assert_eq!(COMMAND_LEN, 48);
        assert_eq!(MEASUREMENT_LEN, 96);
    }

    #[test]
    fn command_layout_is_little_endian_in_field_order() {
        let cmd = CommandFrame {
            cycle_index: 12.0,
            setpoint_a: 0.4356,
            setpoint_b: 0.0,
            weight_a: -0.001,
            weight_b: 0.25,
            control_energy: 3.5,
        };
        let bytes = encode_command(&cmd);
        assert_eq!(
            bytes.to_vec(),
            le_doubles(&[12.0, 0.4356, 0.0, -0.001, 0.25, 3.5])
        );
    }

    #[test]
    fn command_reference_decode_is_bit_exact() {
        let cmd = CommandFrame {
            cycle_index: 4_503_599_627_370_497.0,
            setpoint_a: f64::MIN_POSITIVE,
            setpoint_b: -0.0,
            weight_a: f64::NAN,
            weight_b: f64::NEG_INFINITY,
            control_energy: 1e-308,
        };
        let decoded = decode_command(&encode_command(&cmd)).unwrap();
        for (a, b) in cmd.to_fields().iter().zip(decoded.to_fields()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn measurement_fields_decode_in_wire_order() {
        let values: Vec<f64> = (0..MEASUREMENT_FIELDS).map(|i| i as f64 + 0.5).collect();
        let m = decode_measurement(&le_doubles(&values)).unwrap();
        assert_eq!(m.sim_time, 0.5);
        assert_eq!(m.cycle_index, 1.5);
        assert_eq!(m.reference_pressure, 2.5);
        assert_eq!(m.pressure, 3.5);
        assert_eq!(m.standpipe_pressure, 4.5);
        assert_eq!(m.pump_rate, 5.5);
        assert_eq!(m.bit_rate, 6.5);
        assert_eq!(m.choke_rate, 7.5);
        assert_eq!(m.setpoint_a, 8.5);
        assert_eq!(m.setpoint_b, 9.5);
        assert_eq!(m.actuator_a, 10.5);
        assert_eq!(m.actuator_b, 11.5);
    }

    #[test]
    fn measurement_rejects_every_other_length() {
        let bytes = vec![0u8; 2 * MEASUREMENT_LEN];
        for len in (0..=bytes.len()).filter(|&n| n != MEASUREMENT_LEN) {
            assert_eq!(
                decode_measurement(&bytes[..len]),
                Err(FrameError::WrongLength {
                    expected: MEASUREMENT_LEN,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn fifty_byte_datagram_is_wrong_length() {
        let err = decode_measurement(&[0xAB; 50]).unwrap_err();
        assert_eq!(err.to_string(), "wrong frame length: expected 96 bytes, got 50");
    }

    #[test]
    fn command_decoder_rejects_measurement_sized_input() {
        assert!(decode_command(&[0u8; MEASUREMENT_LEN]).is_err());
    }

    #[test]
    fn nan_passes_through_measurement_decode() {
        let m = MeasurementFrame {
            pressure: f64::NAN,
            cycle_index: f64::NAN,
            ..MeasurementFrame::default()
        };
        let decoded = decode_measurement(&encode_measurement(&m)).unwrap();
        assert!(decoded.pressure.is_nan());
        assert_eq!(decoded.cycle(), 0);
    }

    #[test]
    fn cycle_truncates_and_saturates() {
        let mut m = MeasurementFrame {
            cycle_index: 41.9,
            ..MeasurementFrame::default()
        };
        assert_eq!(m.cycle(), 41);
        m.cycle_index = 1e300;
        assert_eq!(m.cycle(), i64::MAX);
        m.cycle_index = -3.7;
        assert_eq!(m.cycle(), -3);
    }

    #[test]
    fn display_uses_four_decimals() {
        let m = MeasurementFrame {
            sim_time: 1.0,
            cycle_index: 7.0,
            reference_pressure: 10.0,
            pressure: 9.123_456,
            ..MeasurementFrame::default()
        };
        let s = m.to_string();
        assert!(s.starts_with("t=1.0000, cycle=7, p_ref=10.0000, p=9.1235,"));
        assert!(s.ends_with("w_b=0.0000"));
    }
}
