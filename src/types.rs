use geo::Point;
use serde::Serialize;
use std::collections::HashMap;

/// One row of the source sheet, before coordinate normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTankRow {
    pub station_id: String,
    pub company_name: String,
    pub municipality: String,
    pub product: String,
    pub capacity_m3: Option<f64>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// A row whose coordinates were both normalized to finite decimal degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct TankRecord {
    pub station_id: String,
    pub company_name: String,
    pub municipality: String,
    pub product: String,
    pub capacity_m3: f64,
    // x = longitude, y = latitude
    pub location: Point<f64>,
}

impl TankRecord {
    pub fn latitude(&self) -> f64 {
        self.location.y()
    }

    pub fn longitude(&self) -> f64 {
        self.location.x()
    }
}

/// Result of the cleaning pass: kept rows in source order plus how many were dropped.
#[derive(Debug, Clone, Default)]
pub struct CleanOutcome {
    pub records: Vec<TankRecord>,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCapacity {
    pub product: String,
    pub capacity_m3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityProductCapacity {
    pub municipality: String,
    pub product: String,
    pub capacity_m3: f64,
}

/// Product -> color, fixed at load time in first-seen product order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryColors {
    pub(crate) order: Vec<(String, String)>,
    pub(crate) index: HashMap<String, usize>,
}

/// Everything the presentation layer needs, computed once per run.
#[derive(Debug, Clone)]
pub struct DashboardData {
    pub records: Vec<TankRecord>,
    pub dropped_rows: usize,
    pub unique_stations: usize,
    pub total_capacity_m3: f64,
    pub by_product: Vec<ProductCapacity>,
    pub by_municipality_product: Vec<MunicipalityProductCapacity>,
    pub colors: CategoryColors,
}
