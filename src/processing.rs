use crate::config::{AppConfig, MapConfig, DEFAULT_PALETTE};
use crate::data;
use crate::types::{
    CategoryColors, CleanOutcome, DashboardData, MunicipalityProductCapacity, ProductCapacity,
    TankRecord,
};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Load, clean and aggregate the configured source once.
pub fn run_pipeline(config: &AppConfig) -> Result<DashboardData> {
    let outcome = data::load_and_clean(&config.input)?;
    let dashboard = build_dashboard_data(outcome, &config.map);

    if dashboard.records.is_empty() {
        warn!("No rows with valid coordinates; maps will use the fallback center");
    }

    Ok(dashboard)
}

pub fn build_dashboard_data(outcome: CleanOutcome, map: &MapConfig) -> DashboardData {
    let records = outcome.records;

    let unique = unique_stations(&records);
    let total = total_capacity(&records);
    let by_product = capacity_by_product(&records);
    let by_municipality_product = capacity_by_municipality_product(&records);
    let colors = CategoryColors::assign(&records, &map.palette);

    info!(
        "Aggregated {} stations, {:.1} m³ across {} products and {} municipality/product pairs",
        unique,
        total,
        by_product.len(),
        by_municipality_product.len()
    );

    DashboardData {
        records,
        dropped_rows: outcome.dropped,
        unique_stations: unique,
        total_capacity_m3: total,
        by_product,
        by_municipality_product,
        colors,
    }
}

/// Number of distinct station ids.
pub fn unique_stations(records: &[TankRecord]) -> usize {
    let mut seen = HashSet::new();
    records.iter().filter(|r| seen.insert(r.station_id.as_str())).count()
}

/// Raw per-row sum; a station with several products counts every row.
pub fn total_capacity(records: &[TankRecord]) -> f64 {
    records.iter().map(|r| r.capacity_m3).sum()
}

pub fn capacity_by_product(records: &[TankRecord]) -> Vec<ProductCapacity> {
    group_sums(records, |r| r.product.clone())
        .into_iter()
        .map(|(product, capacity_m3)| ProductCapacity { product, capacity_m3 })
        .collect()
}

pub fn capacity_by_municipality_product(records: &[TankRecord]) -> Vec<MunicipalityProductCapacity> {
    group_sums(records, |r| (r.municipality.clone(), r.product.clone()))
        .into_iter()
        .map(|((municipality, product), capacity_m3)| MunicipalityProductCapacity {
            municipality,
            product,
            capacity_m3,
        })
        .collect()
}

// Sums capacity per key, keys in first-seen order.
fn group_sums<K, F>(records: &[TankRecord], key: F) -> Vec<(K, f64)>
where
    K: Eq + std::hash::Hash + Clone,
    F: Fn(&TankRecord) -> K,
{
    let mut groups: Vec<(K, f64)> = Vec::new();
    let mut positions: HashMap<K, usize> = HashMap::new();

    for record in records {
        let k = key(record);
        match positions.get(&k) {
            Some(&i) => groups[i].1 += record.capacity_m3,
            None => {
                positions.insert(k.clone(), groups.len());
                groups.push((k, record.capacity_m3));
            }
        }
    }

    groups
}

impl CategoryColors {
    /// Assign palette colors round-robin to products in first-seen order.
    pub fn assign(records: &[TankRecord], palette: &[String]) -> Self {
        let palette: Vec<String> = if palette.is_empty() {
            DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
        } else {
            palette.to_vec()
        };

        let mut colors = CategoryColors::default();
        for record in records {
            if colors.index.contains_key(&record.product) {
                continue;
            }
            let color = palette[colors.order.len() % palette.len()].clone();
            colors.index.insert(record.product.clone(), colors.order.len());
            colors.order.push((record.product.clone(), color));
        }
        colors
    }

    pub fn color_for(&self, product: &str) -> Option<&str> {
        self.index.get(product).map(|&i| self.order[i].1.as_str())
    }

    /// Products with their colors, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::clean_rows;
    use crate::types::RawTankRow;
    use geo::Point;

    pub(crate) fn record(id: &str, municipality: &str, product: &str, capacity: f64) -> TankRecord {
        TankRecord {
            station_id: id.to_string(),
            company_name: format!("Posto {}", id),
            municipality: municipality.to_string(),
            product: product.to_string(),
            capacity_m3: capacity,
            location: Point::new(-35.0, -7.0),
        }
    }

    fn palette(colors: &[&str]) -> Vec<String> {
        colors.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> Vec<TankRecord> {
        vec![
            record("1", "João Pessoa", "GASOLINA", 30.0),
            record("1", "João Pessoa", "DIESEL", 15.0),
            record("2", "Patos", "GASOLINA", 20.0),
            record("3", "João Pessoa", "ETANOL", 10.0),
            record("3", "João Pessoa", "GASOLINA", 5.5),
        ]
    }

    #[test]
    fn test_end_to_end_three_rows() {
        let raw = |id: &str, product: &str, lat: &str, cap: f64| RawTankRow {
            station_id: id.to_string(),
            company_name: format!("Posto {}", id),
            municipality: "M".to_string(),
            product: product.to_string(),
            capacity_m3: Some(cap),
            latitude: Some(lat.to_string()),
            longitude: Some("-35:0:0".to_string()),
        };
        let outcome = clean_rows(vec![
            raw("A", "X", "-7:0:0", 100.0),
            raw("A", "Y", "-7:0:0", 200.0),
            raw("B", "X", "bad", 50.0),
        ]);

        let data = build_dashboard_data(outcome, &MapConfig::default());

        assert_eq!(data.dropped_rows, 1);
        assert_eq!(data.unique_stations, 1);
        assert_eq!(data.total_capacity_m3, 300.0);
        assert_eq!(
            data.by_product,
            vec![
                ProductCapacity { product: "X".to_string(), capacity_m3: 100.0 },
                ProductCapacity { product: "Y".to_string(), capacity_m3: 200.0 },
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let data = build_dashboard_data(CleanOutcome::default(), &MapConfig::default());
        assert_eq!(data.unique_stations, 0);
        assert_eq!(data.total_capacity_m3, 0.0);
        assert!(data.by_product.is_empty());
        assert!(data.by_municipality_product.is_empty());
        assert_eq!(data.colors.iter().count(), 0);
    }

    #[test]
    fn test_unique_stations_first_occurrence() {
        let records = sample();
        assert_eq!(unique_stations(&records), 3);
        assert!(unique_stations(&records) <= records.len());

        let distinct = vec![record("a", "M", "X", 1.0), record("b", "M", "X", 1.0)];
        assert_eq!(unique_stations(&distinct), distinct.len());
    }

    #[test]
    fn test_total_keeps_duplicate_rows() {
        let records = vec![record("a", "M", "X", 10.0), record("a", "M", "X", 10.0)];
        assert_eq!(total_capacity(&records), 20.0);
    }

    #[test]
    fn test_category_totals_partition_total() {
        let records = sample();
        let by_product = capacity_by_product(&records);
        let summed: f64 = by_product.iter().map(|p| p.capacity_m3).sum();
        let total = total_capacity(&records);
        assert!((summed - total).abs() <= 1e-6 * total.abs());

        let products: Vec<&str> = by_product.iter().map(|p| p.product.as_str()).collect();
        assert_eq!(products, vec!["GASOLINA", "DIESEL", "ETANOL"]);
        assert_eq!(by_product[0].capacity_m3, 55.5);
    }

    #[test]
    fn test_by_municipality_product_first_seen_order() {
        let grouped = capacity_by_municipality_product(&sample());
        let keys: Vec<(&str, &str)> = grouped
            .iter()
            .map(|g| (g.municipality.as_str(), g.product.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("João Pessoa", "GASOLINA"),
                ("João Pessoa", "DIESEL"),
                ("Patos", "GASOLINA"),
                ("João Pessoa", "ETANOL"),
            ]
        );
        assert_eq!(grouped[0].capacity_m3, 35.5);
        assert!(grouped.iter().all(|g| g.capacity_m3 > 0.0));
    }

    #[test]
    fn test_colors_round_robin_and_stable() {
        let records = vec![
            record("1", "M", "A", 1.0),
            record("2", "M", "B", 1.0),
            record("3", "M", "A", 1.0),
            record("4", "M", "C", 1.0),
        ];
        let palette = palette(&["green", "red"]);

        let first = CategoryColors::assign(&records, &palette);
        let second = CategoryColors::assign(&records, &palette);

        assert_eq!(first, second);
        assert_eq!(first.color_for("A"), Some("green"));
        assert_eq!(first.color_for("B"), Some("red"));
        assert_eq!(first.color_for("C"), Some("green"));
        assert_eq!(first.color_for("Z"), None);
        let order: Vec<&str> = first.iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_empty_palette_uses_default() {
        let colors = CategoryColors::assign(&[record("1", "M", "A", 1.0)], &[]);
        assert_eq!(colors.color_for("A"), Some("green"));
    }
}
