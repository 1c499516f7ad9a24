//! NPP-301 bridge arithmetic on the master side.
//!
//! Turns the five pin readings of an `a` reply into arm resistances, and
//! searches the E24 series for balance resistors.

use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

/// Sense resistor at the foot of each bridge arm on the characterizer board.
pub const DEFAULT_RREF: f64 = 1000.0;

/// E24 resistor values from 1 ohm to 91 kohm.
pub const E24: [f64; 120] = [
    1.0, 1.1, 1.2, 1.3, 1.5, 1.6, 1.8, 2.0, 2.2, 2.4, 2.7, 3.0, //
    3.3, 3.6, 3.9, 4.3, 4.7, 5.1, 5.6, 6.2, 6.8, 7.5, 8.2, 9.1, //
    10.0, 11.0, 12.0, 13.0, 15.0, 16.0, 18.0, 20.0, 22.0, 24.0, 27.0, 30.0, //
    33.0, 36.0, 39.0, 43.0, 47.0, 51.0, 56.0, 62.0, 68.0, 75.0, 82.0, 91.0, //
    100.0, 110.0, 120.0, 130.0, 150.0, 160.0, 180.0, 200.0, 220.0, 240.0, 270.0, 300.0, //
    330.0, 360.0, 390.0, 430.0, 470.0, 510.0, 560.0, 620.0, 680.0, 750.0, 820.0, 910.0, //
    1.0e3, 1.1e3, 1.2e3, 1.3e3, 1.5e3, 1.6e3, 1.8e3, 2.0e3, 2.2e3, 2.4e3, 2.7e3, 3.0e3, //
    3.3e3, 3.6e3, 3.9e3, 4.3e3, 4.7e3, 5.1e3, 5.6e3, 6.2e3, 6.8e3, 7.5e3, 8.2e3, 9.1e3, //
    10.0e3, 11.0e3, 12.0e3, 13.0e3, 15.0e3, 16.0e3, 18.0e3, 20.0e3, 22.0e3, 24.0e3, 27.0e3, 30.0e3, //
    33.0e3, 36.0e3, 39.0e3, 43.0e3, 47.0e3, 51.0e3, 56.0e3, 62.0e3, 68.0e3, 75.0e3, 82.0e3, 91.0e3,
];

/// ADC counts from one `a` reply, named by sensor pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeReadings {
    pub pin8: u16,
    pub pin2: u16,
    pub pin4: u16,
    pub pin5: u16,
    pub pin6: u16,
}

impl FromStr for BridgeReadings {
    type Err = ClientError;

    /// Parses the body of an `a` reply: five whitespace-separated counts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ClientError::InvalidReadings(s.to_string());
        let mut values = [0u16; 5];
        let mut fields = s.split_whitespace();
        for value in values.iter_mut() {
            *value = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        }
        if fields.next().is_some() {
            return Err(invalid());
        }
        let [pin8, pin2, pin4, pin5, pin6] = values;
        Ok(BridgeReadings {
            pin8,
            pin2,
            pin4,
            pin5,
            pin6,
        })
    }
}

impl fmt::Display for BridgeReadings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a8={} a2={} a4={} a5={} a6={}",
            self.pin8, self.pin2, self.pin4, self.pin5, self.pin6
        )
    }
}

/// Arm resistances in ohms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resistances {
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub r4: f64,
}

impl fmt::Display for Resistances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "r1={:.1} r2={:.1} r3={:.1} r4={:.1}",
            self.r1, self.r2, self.r3, self.r4
        )
    }
}

impl BridgeReadings {
    /// Arm resistances, using the current through the sense resistor
    /// `rref` at the foot of each arm. `None` if an arm carries no current.
    pub fn resistances(&self, rref: f64) -> Option<Resistances> {
        if self.pin4 == 0 || self.pin5 == 0 {
            return None;
        }
        let [a8, a2, a4, a5, a6] =
            [self.pin8, self.pin2, self.pin4, self.pin5, self.pin6].map(f64::from);
        Some(Resistances {
            r1: (a8 - a2) / a4 * rref,
            r2: (a2 - a4) / a4 * rref,
            r3: (a8 - a6) / a5 * rref,
            r4: (a6 - a5) / a5 * rref,
        })
    }
}

/// Two resistors in parallel. A zero value means "not fitted".
pub fn parallel(ra: f64, rb: f64) -> f64 {
    if ra == 0.0 || rb == 0.0 {
        0.0
    } else {
        1.0 / (1.0 / ra + 1.0 / rb)
    }
}

/// Measured bridge plus a choice of balance resistors.
///
/// RA and RB sit in parallel at the foot of the R1/R2 arm, RC and RD at the
/// foot of the R3/R4 arm.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bridge {
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub r4: f64,
    pub ra: f64,
    pub rb: f64,
    pub rc: f64,
    pub rd: f64,
}

impl Bridge {
    pub fn new(r1: f64, r2: f64, r3: f64, r4: f64) -> Self {
        Self {
            r1,
            r2,
            r3,
            r4,
            ..Default::default()
        }
    }

    /// v2 - v6 for a unit excitation.
    pub fn unbalance(&self) -> f64 {
        let rab = parallel(self.ra, self.rb);
        let rcd = parallel(self.rc, self.rd);
        let i12 = 1.0 / (self.r1 + self.r2 + rab);
        let i34 = 1.0 / (self.r3 + self.r4 + rcd);
        let v2 = 1.0 - self.r1 * i12;
        let v6 = 1.0 - self.r3 * i34;
        v2 - v6
    }
}

/// Balance resistor choice that brings the unbalance within tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub bridge: Bridge,
    pub unbalance: f64,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bridge;
        write!(
            f,
            "RA={:.1} RB={:.1} RC={:.1} RD={:.1} v2mv6={:.1e} (RAB={:.1} RCD={:.1})",
            b.ra,
            b.rb,
            b.rc,
            b.rd,
            self.unbalance,
            parallel(b.ra, b.rb),
            parallel(b.rc, b.rd)
        )
    }
}

/// Every E24 pair that balances `bridge` to within `tolerance`.
///
/// A positive initial unbalance is corrected on the R3/R4 arm, anything
/// else on the R1/R2 arm.
pub fn balance_candidates(bridge: Bridge, tolerance: f64) -> Vec<Candidate> {
    let base = Bridge::new(bridge.r1, bridge.r2, bridge.r3, bridge.r4);
    let correct_second_arm = base.unbalance() > 0.0;

    let mut candidates = Vec::new();
    for &x in &E24 {
        for &y in &E24 {
            let trial = if correct_second_arm {
                Bridge { rc: x, rd: y, ..base }
            } else {
                Bridge { ra: x, rb: y, ..base }
            };
            let unbalance = trial.unbalance();
            if unbalance.abs() < tolerance {
                candidates.push(Candidate {
                    bridge: trial,
                    unbalance,
                });
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_analog_reply_body() {
        let r: BridgeReadings = "4080 2225 371 371 2225".parse().unwrap();
        assert_eq!(r.pin8, 4080);
        assert_eq!(r.pin6, 2225);
        assert_eq!(r.to_string(), "a8=4080 a2=2225 a4=371 a5=371 a6=2225");
    }

    #[test]
    fn rejects_wrong_reading_count() {
        assert!("1 2 3 4".parse::<BridgeReadings>().is_err());
        assert!("1 2 3 4 5 6".parse::<BridgeReadings>().is_err());
        assert!("1 2 x 4 5".parse::<BridgeReadings>().is_err());
        assert!("error: no value".parse::<BridgeReadings>().is_err());
    }

    #[test]
    fn computes_arm_resistances() {
        let r = BridgeReadings {
            pin8: 4000,
            pin2: 2200,
            pin4: 400,
            pin5: 500,
            pin6: 2500,
        };
        let res = r.resistances(DEFAULT_RREF).unwrap();
        assert_eq!(res.r1, 4500.0);
        assert_eq!(res.r2, 4500.0);
        assert_eq!(res.r3, 3000.0);
        assert_eq!(res.r4, 4000.0);
    }

    #[test]
    fn unpowered_bridge_has_no_resistances() {
        let r: BridgeReadings = "0 0 0 0 0".parse().unwrap();
        assert_eq!(r.resistances(DEFAULT_RREF), None);
    }

    #[test]
    fn parallel_treats_zero_as_open() {
        assert_eq!(parallel(0.0, 100.0), 0.0);
        assert_eq!(parallel(100.0, 100.0), 50.0);
    }

    #[test]
    fn matched_bridge_is_balanced() {
        assert_eq!(Bridge::new(5000.0, 5000.0, 5000.0, 5000.0).unbalance(), 0.0);
    }

    #[test]
    fn candidates_correct_the_arm_with_higher_output() {
        // R1 smaller than R3 puts v2 above v6.
        let bridge = Bridge::new(4900.0, 5000.0, 5000.0, 5000.0);
        assert!(bridge.unbalance() > 0.0);
        let candidates = balance_candidates(bridge, 1e-3);
        assert!(!candidates.is_empty());
        for c in &candidates {
            assert_eq!((c.bridge.ra, c.bridge.rb), (0.0, 0.0));
            assert!(c.unbalance.abs() < 1e-3);
        }

        let bridge = Bridge::new(5000.0, 5000.0, 4900.0, 5000.0);
        for c in &balance_candidates(bridge, 1e-3) {
            assert_eq!((c.bridge.rc, c.bridge.rd), (0.0, 0.0));
        }
    }

    #[test]
    fn impossible_tolerance_yields_nothing() {
        let bridge = Bridge::new(1000.0, 9000.0, 5000.0, 5000.0);
        assert!(balance_candidates(bridge, 0.0).is_empty());
    }
}
