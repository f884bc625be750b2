// dc-core/src/units.rs

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uom::si::energy::{gigawatt_hour, kilowatt_hour, megawatt_hour, terawatt_hour};
use uom::si::f64::Energy as UomEnergy;

use crate::CoreError;

pub type Energy = UomEnergy;

/// Display unit for energy values.
///
/// Values are stored and exchanged in the canonical unit (kWh); every other
/// unit is a fixed multiplicative conversion from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnergyUnit {
    #[default]
    Kwh,
    Mwh,
    Gwh,
    Twh,
}

impl EnergyUnit {
    pub const ALL: [EnergyUnit; 4] = [
        EnergyUnit::Kwh,
        EnergyUnit::Mwh,
        EnergyUnit::Gwh,
        EnergyUnit::Twh,
    ];

    /// Unit values are persisted and fetched in.
    pub const fn canonical() -> Self {
        EnergyUnit::Kwh
    }

    pub fn label(self) -> &'static str {
        match self {
            EnergyUnit::Kwh => "kWh",
            EnergyUnit::Mwh => "MWh",
            EnergyUnit::Gwh => "GWh",
            EnergyUnit::Twh => "TWh",
        }
    }

    /// Convert a canonical (kWh) value into this unit.
    pub fn from_canonical(self, value: f64) -> f64 {
        let energy = Energy::new::<kilowatt_hour>(value);
        match self {
            EnergyUnit::Kwh => energy.get::<kilowatt_hour>(),
            EnergyUnit::Mwh => energy.get::<megawatt_hour>(),
            EnergyUnit::Gwh => energy.get::<gigawatt_hour>(),
            EnergyUnit::Twh => energy.get::<terawatt_hour>(),
        }
    }

    /// Convert a value in this unit back to the canonical unit.
    pub fn to_canonical(self, value: f64) -> f64 {
        let energy = match self {
            EnergyUnit::Kwh => Energy::new::<kilowatt_hour>(value),
            EnergyUnit::Mwh => Energy::new::<megawatt_hour>(value),
            EnergyUnit::Gwh => Energy::new::<gigawatt_hour>(value),
            EnergyUnit::Twh => Energy::new::<terawatt_hour>(value),
        };
        energy.get::<kilowatt_hour>()
    }

    /// Convert a value expressed in this unit into `target`.
    pub fn convert(self, value: f64, target: EnergyUnit) -> f64 {
        if self == target {
            return value;
        }
        target.from_canonical(self.to_canonical(value))
    }

    /// Multiplier applied to canonical values.
    pub fn factor(self) -> f64 {
        self.from_canonical(1.0)
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EnergyUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kwh" => Ok(EnergyUnit::Kwh),
            "mwh" => Ok(EnergyUnit::Mwh),
            "gwh" => Ok(EnergyUnit::Gwh),
            "twh" => Ok(EnergyUnit::Twh),
            _ => Err(CoreError::UnknownUnit(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn factors_step_by_thousand() {
        assert!(close(EnergyUnit::Kwh.factor(), 1.0));
        assert!(close(EnergyUnit::Mwh.factor(), 1.0e-3));
        assert!(close(EnergyUnit::Gwh.factor(), 1.0e-6));
        assert!(close(EnergyUnit::Twh.factor(), 1.0e-9));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("GWh".parse::<EnergyUnit>(), Ok(EnergyUnit::Gwh));
        assert!("joule".parse::<EnergyUnit>().is_err());
    }

    #[test]
    fn converts_between_display_units() {
        assert!(close(EnergyUnit::Gwh.convert(2.5, EnergyUnit::Mwh), 2500.0));
        assert!(close(EnergyUnit::Twh.to_canonical(1.0), 1.0e9));
        assert_eq!(EnergyUnit::Mwh.convert(7.0, EnergyUnit::Mwh), 7.0);
    }

    proptest! {
        #[test]
        fn conversion_is_multiplicative(value in -1.0e12f64..1.0e12) {
            for unit in EnergyUnit::ALL {
                prop_assert!(close(unit.from_canonical(value), value * unit.factor()));
            }
        }
    }
}
