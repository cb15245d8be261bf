use crate::error::{DashboardError, DashboardResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Value range and color ramp used to render a pollutant layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
    pub palette: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub dataset: &'static str,
    pub band: &'static str,
    pub unit: &'static str,
    pub display: DisplayRange,
}

/// The pollutants the dashboard knows about. The set is closed; anything
/// else coming in from a request is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pollutant {
    No2,
    Co,
    O3,
    So2,
    Hcho,
    AerosolIndex,
}

const MOL_PER_M2: &str = "mol/m²";

static NO2: PollutantSpec = PollutantSpec {
    id: "no2",
    label: "NO₂",
    dataset: "COPERNICUS/S5P/OFFL/L3_NO2",
    band: "tropospheric_NO2_column_number_density",
    unit: MOL_PER_M2,
    display: DisplayRange {
        min: 0.0,
        max: 0.0003,
        palette: &["green", "yellow", "orange", "red", "maroon"],
    },
};

static CO: PollutantSpec = PollutantSpec {
    id: "co",
    label: "CO",
    dataset: "COPERNICUS/S5P/OFFL/L3_CO",
    band: "CO_column_number_density",
    unit: MOL_PER_M2,
    display: DisplayRange {
        min: 0.02,
        max: 0.06,
        palette: &["navy", "blue", "cyan", "lime", "yellow", "red"],
    },
};

static O3: PollutantSpec = PollutantSpec {
    id: "o3",
    label: "O₃",
    dataset: "COPERNICUS/S5P/OFFL/L3_O3",
    band: "O3_column_number_density",
    unit: MOL_PER_M2,
    display: DisplayRange {
        min: 0.1,
        max: 0.13,
        palette: &["orange", "red", "blue", "lime", "yellow", "maroon", "cyan", "purple"],
    },
};

static SO2: PollutantSpec = PollutantSpec {
    id: "so2",
    label: "SO₂",
    dataset: "COPERNICUS/S5P/OFFL/L3_SO2",
    band: "SO2_column_number_density",
    unit: MOL_PER_M2,
    display: DisplayRange {
        min: 0.0,
        max: 0.0005,
        palette: &["purple", "blue", "green", "yellow", "orange", "red", "lime", "cyan"],
    },
};

static HCHO: PollutantSpec = PollutantSpec {
    id: "hcho",
    label: "HCHO",
    dataset: "COPERNICUS/S5P/OFFL/L3_HCHO",
    band: "tropospheric_HCHO_column_number_density",
    unit: MOL_PER_M2,
    display: DisplayRange {
        min: 0.0001,
        max: 0.00025,
        palette: &["white", "green", "yellow", "orange", "red", "blue"],
    },
};

static AER_AI: PollutantSpec = PollutantSpec {
    id: "aer_ai",
    label: "Aerosol Index",
    dataset: "COPERNICUS/S5P/OFFL/L3_AER_AI",
    band: "absorbing_aerosol_index",
    unit: "Index",
    display: DisplayRange {
        min: -1.5,
        max: 0.4,
        palette: &["red", "blue", "green", "yellow", "orange", "purple", "lime", "cyan"],
    },
};

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::No2,
        Pollutant::Co,
        Pollutant::O3,
        Pollutant::So2,
        Pollutant::Hcho,
        Pollutant::AerosolIndex,
    ];

    pub fn spec(self) -> &'static PollutantSpec {
        match self {
            Pollutant::No2 => &NO2,
            Pollutant::Co => &CO,
            Pollutant::O3 => &O3,
            Pollutant::So2 => &SO2,
            Pollutant::Hcho => &HCHO,
            Pollutant::AerosolIndex => &AER_AI,
        }
    }

    pub fn id(self) -> &'static str {
        self.spec().id
    }
}

impl FromStr for Pollutant {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase();
        Pollutant::ALL
            .iter()
            .copied()
            .find(|p| p.id() == id)
            .ok_or_else(|| DashboardError::Configuration(format!("unknown pollutant '{}'", s)))
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().label)
    }
}

/// Checked once at startup. Legend interpolation divides by `palette.len() - 1`.
pub fn validate_table() -> DashboardResult<()> {
    for p in Pollutant::ALL {
        let spec = p.spec();
        if spec.display.palette.len() < 2 {
            return Err(DashboardError::Configuration(format!(
                "palette for {} needs at least 2 colors, has {}",
                spec.id,
                spec.display.palette.len()
            )));
        }
        if !spec.display.min.is_finite() || !spec.display.max.is_finite() {
            return Err(DashboardError::Configuration(format!(
                "display range for {} is not finite",
                spec.id
            )));
        }
    }
    Ok(())
}
