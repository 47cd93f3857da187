//! Control laws.
//!
//! A law maps the latest measurement and the previous actuation to the next
//! actuation. Laws hold only their tuning constants; anything that evolves
//! cycle to cycle is passed in through [`Actuation`], which the session owns.

use crate::protocol::MeasurementFrame;

/// Default proportional gain on choke pressure error.
pub const DEFAULT_PROPORTIONAL_GAIN: f64 = -0.001;

/// Actuator outputs carried in every command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Actuation {
    pub weight_a: f64,
    pub weight_b: f64,
    pub control_energy: f64,
}

impl Actuation {
    pub const ZERO: Self = Self {
        weight_a: 0.0,
        weight_b: 0.0,
        control_energy: 0.0,
    };
}

/// A feedback law invoked once per advanced simulation cycle.
pub trait ControlLaw {
    /// Computes the next actuation.
    ///
    /// Must be deterministic in its inputs. The session calls this only when
    /// the cycle index strictly advances.
    fn update(&self, measurement: &MeasurementFrame, previous: &Actuation) -> Actuation;
}

impl<L: ControlLaw + ?Sized> ControlLaw for Box<L> {
    fn update(&self, measurement: &MeasurementFrame, previous: &Actuation) -> Actuation {
        (**self).update(measurement, previous)
    }
}

/// Proportional control of channel A on choke pressure error.
///
/// `weight_a = gain * (reference_pressure - pressure)`. Channel B and the
/// control energy are not computed by this law and pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionalLaw {
    gain: f64,
}

impl ProportionalLaw {
    #[must_use]
    pub const fn new(gain: f64) -> Self {
        Self { gain }
    }
}

impl Default for ProportionalLaw {
    fn default() -> Self {
        Self::new(DEFAULT_PROPORTIONAL_GAIN)
    }
}

impl ControlLaw for ProportionalLaw {
    fn update(&self, measurement: &MeasurementFrame, previous: &Actuation) -> Actuation {
        Actuation {
            weight_a: self.gain * (measurement.reference_pressure - measurement.pressure),
            ..*previous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(reference: f64, pressure: f64) -> MeasurementFrame {
        MeasurementFrame {
            reference_pressure: reference,
            pressure,
            ..MeasurementFrame::default()
        }
    }

    #[test]
    fn proportional_on_pressure_error() {
        let law = ProportionalLaw::default();
        let out = law.update(&measurement(10.0, 9.0), &Actuation::ZERO);
        assert!((out.weight_a - -0.001).abs() < 1e-15);
    }

    #[test]
    fn channel_b_and_energy_pass_through() {
        let law = ProportionalLaw::new(-0.5);
        let previous = Actuation {
            weight_a: 9.0,
            weight_b: 0.3,
            control_energy: 12.0,
        };
        let out = law.update(&measurement(2.0, 4.0), &previous);
        assert_eq!(out.weight_a, 1.0);
        assert_eq!(out.weight_b, 0.3);
        assert_eq!(out.control_energy, 12.0);
    }

    #[test]
    fn zero_error_gives_zero_weight() {
        let law = ProportionalLaw::default();
        let out = law.update(&measurement(35.2, 35.2), &Actuation::ZERO);
        assert_eq!(out.weight_a, 0.0);
    }

    #[test]
    fn nan_pressure_propagates() {
        let law = ProportionalLaw::default();
        let out = law.update(&measurement(10.0, f64::NAN), &Actuation::ZERO);
        assert!(out.weight_a.is_nan());
    }

    #[test]
    fn boxed_law_delegates() {
        let law: Box<dyn ControlLaw> = Box::new(ProportionalLaw::new(2.0));
        let out = law.update(&measurement(3.0, 1.0), &Actuation::ZERO);
        assert_eq!(out.weight_a, 4.0);
    }
}
