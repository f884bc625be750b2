use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, SectorName};

const LOSSES: &str = "LOSSES";
const CONSOLIDATED: &str = "CONSOLIDATED";

/// What a scenario view is focused on: a real sector or one of the two pseudo-sectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActiveSelection {
    Sector(SectorName),
    Losses,
    Consolidated,
}

impl ActiveSelection {
    /// First real sector, or the consolidated view when there is none.
    pub fn first_of(sectors: &[SectorName]) -> Self {
        sectors
            .first()
            .cloned()
            .map(ActiveSelection::Sector)
            .unwrap_or(ActiveSelection::Consolidated)
    }

    pub fn is_valid_for(&self, sectors: &[SectorName]) -> bool {
        match self {
            ActiveSelection::Sector(name) => sectors.contains(name),
            ActiveSelection::Losses | ActiveSelection::Consolidated => true,
        }
    }

    pub fn sector(&self) -> Option<&SectorName> {
        match self {
            ActiveSelection::Sector(name) => Some(name),
            _ => None,
        }
    }
}

impl From<String> for ActiveSelection {
    fn from(value: String) -> Self {
        match value.as_str() {
            LOSSES => ActiveSelection::Losses,
            CONSOLIDATED => ActiveSelection::Consolidated,
            _ => ActiveSelection::Sector(SectorName::from(value)),
        }
    }
}

impl From<ActiveSelection> for String {
    fn from(value: ActiveSelection) -> Self {
        match value {
            ActiveSelection::Sector(name) => name.as_str().to_string(),
            ActiveSelection::Losses => LOSSES.to_string(),
            ActiveSelection::Consolidated => CONSOLIDATED.to_string(),
        }
    }
}

impl fmt::Display for ActiveSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveSelection::Sector(name) => f.write_str(name.as_str()),
            ActiveSelection::Losses => f.write_str(LOSSES),
            ActiveSelection::Consolidated => f.write_str(CONSOLIDATED),
        }
    }
}

/// Which demand series a consolidated projection is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DemandType {
    #[default]
    #[serde(rename = "gross")]
    Gross,
    #[serde(rename = "net")]
    Net,
    #[serde(rename = "onGrid")]
    OnGrid,
}

impl DemandType {
    pub fn as_str(self) -> &'static str {
        match self {
            DemandType::Gross => "gross",
            DemandType::Net => "net",
            DemandType::OnGrid => "onGrid",
        }
    }
}

impl fmt::Display for DemandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemandType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gross" => Ok(DemandType::Gross),
            "net" => Ok(DemandType::Net),
            "onGrid" | "on-grid" | "ongrid" => Ok(DemandType::OnGrid),
            _ => Err(CoreError::UnknownDemandType(s.to_string())),
        }
    }
}
