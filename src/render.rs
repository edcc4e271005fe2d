use crate::config::{AppConfig, MapConfig};
use crate::types::{DashboardData, TankRecord};
use anyhow::{Context, Result};
use geo::{Centroid, MultiPoint, Point};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::info;

const LEAFLET_HEAD: &str = r#"<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>"#;

const CLUSTER_HEAD: &str = r#"<link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.Default.css" />
  <script src="https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"></script>"#;

const MAP_PAGE: &str = r#"<!doctype html>
<html lang="pt-BR">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>__TITLE__</title>
  __HEAD__
  <style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
  <div id="map"></div>
  <script>
    const map = L.map("map").setView(__CENTER__, __ZOOM__);
    L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
      maxZoom: 19,
      attribution: "&copy; OpenStreetMap contributors",
    }).addTo(map);
__SCRIPT__
  </script>
</body>
</html>
"#;

const LAYERED_SCRIPT: &str = r#"
    const layers = __DATA__;
    const overlays = {};
    for (const layer of layers) {
      const group = L.geoJSON(layer.stations, {
        pointToLayer: (feature, latlng) => L.circleMarker(latlng, {
          radius: feature.properties.radius,
          color: layer.color,
          fill: true,
          fillColor: layer.color,
          fillOpacity: 0.7,
        }),
        onEachFeature: (feature, marker) => marker.bindPopup(feature.properties.popup, { maxWidth: 300 }),
      });
      group.addTo(map);
      overlays[layer.name] = group;
    }
    L.control.layers(null, overlays, { collapsed: false }).addTo(map);
"#;

const CLUSTER_SCRIPT: &str = r#"
    const stations = __DATA__;
    const cluster = L.markerClusterGroup();
    L.geoJSON(stations, {
      pointToLayer: (feature, latlng) => L.marker(latlng).bindPopup(feature.properties.popup),
    }).eachLayer((marker) => cluster.addLayer(marker));
    map.addLayer(cluster);
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct MapArtifacts {
    pub layered: PathBuf,
    pub clustered: PathBuf,
}

#[derive(Serialize)]
struct MapLayer<'a> {
    name: String,
    color: &'a str,
    stations: FeatureCollection,
}

pub fn write_maps(data: &DashboardData, config: &AppConfig) -> Result<MapArtifacts> {
    fs::create_dir_all(&config.output.asset_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", config.output.asset_dir))?;

    let artifacts = MapArtifacts {
        layered: config.layered_map_path(),
        clustered: config.cluster_map_path(),
    };

    fs::write(&artifacts.layered, layered_map_html(data, &config.map)?)
        .with_context(|| format!("Failed to write map: {:?}", artifacts.layered))?;
    fs::write(&artifacts.clustered, clustered_map_html(data, &config.map)?)
        .with_context(|| format!("Failed to write map: {:?}", artifacts.clustered))?;

    info!("Wrote {:?} and {:?}", artifacts.layered, artifacts.clustered);
    Ok(artifacts)
}

/// Mean latitude and longitude of all records, `None` when there are none.
pub fn map_center(records: &[TankRecord]) -> Option<Point<f64>> {
    if records.is_empty() {
        return None;
    }
    MultiPoint::new(records.iter().map(|r| r.location).collect()).centroid()
}

/// Circle radius in pixels: grows with capacity, never below `min_radius`.
pub fn marker_radius(capacity_m3: f64, map: &MapConfig) -> f64 {
    (capacity_m3 / map.radius_divisor).max(map.min_radius)
}

/// One toggleable circle-marker layer per product.
pub fn layered_map_html(data: &DashboardData, map: &MapConfig) -> Result<String> {
    let layers: Vec<MapLayer> = data.colors.iter()
        .map(|(product, color)| MapLayer {
            name: escape_html(&format!("Postos - {}", product)),
            color,
            stations: collection(
                data.records.iter().filter(|r| r.product == product),
                |r| {
                    let mut props = JsonObject::new();
                    props.insert("radius".to_string(), json!(marker_radius(r.capacity_m3, map)));
                    props.insert(
                        "popup".to_string(),
                        json!(format!(
                            "<b>{}</b><br>Produto: {}<br>Tancagem: {} m³",
                            escape_html(&r.company_name),
                            escape_html(&r.product),
                            r.capacity_m3
                        )),
                    );
                    props
                },
            ),
        })
        .collect();

    let script = LAYERED_SCRIPT.replace("__DATA__", &script_json(&layers)?);
    Ok(map_page("Mapa Interativo por Produto", LEAFLET_HEAD.to_string(), data, map, &script))
}

/// Every record as a plain marker inside a single cluster group.
pub fn clustered_map_html(data: &DashboardData, map: &MapConfig) -> Result<String> {
    let stations = collection(data.records.iter(), |r| {
        let mut props = JsonObject::new();
        props.insert("popup".to_string(), json!(escape_html(&r.company_name)));
        props
    });

    let head = format!("{}\n  {}", LEAFLET_HEAD, CLUSTER_HEAD);
    let script = CLUSTER_SCRIPT.replace("__DATA__", &script_json(&stations)?);
    Ok(map_page("Mapa com Cluster de Postos", head, data, map, &script))
}

fn map_page(title: &str, head: String, data: &DashboardData, map: &MapConfig, script: &str) -> String {
    let center = match map_center(&data.records) {
        Some(point) => [point.y(), point.x()],
        None => map.fallback_center,
    };

    MAP_PAGE
        .replace("__TITLE__", &escape_html(title))
        .replace("__HEAD__", &head)
        .replace("__CENTER__", &format!("[{}, {}]", center[0], center[1]))
        .replace("__ZOOM__", &map.zoom_start.to_string())
        // Last, so nothing inside the embedded data gets substituted.
        .replace("__SCRIPT__", script)
}

fn collection<'a, I, F>(records: I, properties: F) -> FeatureCollection
where
    I: Iterator<Item = &'a TankRecord>,
    F: Fn(&TankRecord) -> JsonObject,
{
    let features = records
        .map(|r| Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![r.longitude(), r.latitude()]))),
            id: None,
            properties: Some(properties(r)),
            foreign_members: None,
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON that can sit inside a `<script>` element.
pub(crate) fn script_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value).context("Failed to serialize map data")?;
    Ok(json.replace("</", "<\\/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::build_dashboard_data;
    use crate::processing::tests::record;
    use crate::types::CleanOutcome;

    fn dashboard(records: Vec<TankRecord>) -> DashboardData {
        build_dashboard_data(CleanOutcome { records, dropped: 0 }, &MapConfig::default())
    }

    fn at(mut r: TankRecord, lat: f64, lon: f64) -> TankRecord {
        r.location = Point::new(lon, lat);
        r
    }

    #[test]
    fn test_map_center_is_mean_of_points() {
        let records = vec![
            at(record("1", "M", "A", 1.0), -7.0, -35.0),
            at(record("2", "M", "A", 1.0), -8.0, -37.0),
        ];
        let center = map_center(&records).unwrap();
        assert!((center.y() - (-7.5)).abs() < 1e-9);
        assert!((center.x() - (-36.0)).abs() < 1e-9);
        assert_eq!(map_center(&[]), None);
    }

    #[test]
    fn test_marker_radius_floor_and_growth() {
        let map = MapConfig::default();
        assert_eq!(marker_radius(0.0, &map), 5.0);
        assert_eq!(marker_radius(1000.0, &map), 5.0);
        assert_eq!(marker_radius(5000.0, &map), 10.0);
        assert!(marker_radius(10_000.0, &map) > marker_radius(5000.0, &map));
    }

    #[test]
    fn test_layered_map_has_one_layer_per_product() {
        let data = dashboard(vec![
            record("1", "M", "GASOLINA", 3000.0),
            record("1", "M", "DIESEL", 10.0),
            record("2", "M", "GASOLINA", 10.0),
        ]);

        let html = layered_map_html(&data, &MapConfig::default()).unwrap();

        assert!(html.contains("\"name\":\"Postos - GASOLINA\""));
        assert!(html.contains("\"name\":\"Postos - DIESEL\""));
        assert!(html.contains("\"color\":\"green\""));
        assert!(html.contains("\"color\":\"red\""));
        assert!(html.contains("\"radius\":6.0"));
        assert!(html.contains("L.control.layers(null, overlays, { collapsed: false })"));
        assert!(html.contains("setView([-7, -35], 8)"));
    }

    #[test]
    fn test_popups_are_escaped_and_script_safe() {
        let mut r = record("1", "M", "X", 1.0);
        r.company_name = "<script>alert('x')</script> & Cia".to_string();
        let data = dashboard(vec![r]);

        let html = clustered_map_html(&data, &MapConfig::default()).unwrap();

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; Cia"));
        assert!(html.contains("L.markerClusterGroup()"));
    }

    #[test]
    fn test_empty_dataset_uses_fallback_center() {
        let data = dashboard(Vec::new());
        let map = MapConfig {
            fallback_center: [-7.25, -36.5],
            ..MapConfig::default()
        };

        let html = clustered_map_html(&data, &map).unwrap();
        assert!(html.contains("setView([-7.25, -36.5], 8)"));
        assert!(!html.contains("NaN"));
        assert!(layered_map_html(&data, &map).unwrap().contains("const layers = [];"));
    }

    #[test]
    fn test_write_maps_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.output.asset_dir = dir.path().join("nested").join("assets");
        let data = dashboard(vec![record("1", "M", "A", 1.0)]);

        let artifacts = write_maps(&data, &config).unwrap();

        assert!(artifacts.layered.ends_with("mapa_postos_usinas.html"));
        assert!(artifacts.clustered.ends_with("mapa_simples.html"));
        let layered = fs::read_to_string(&artifacts.layered).unwrap();
        assert!(layered.starts_with("<!doctype html>"));
        assert!(fs::read_to_string(&artifacts.clustered).unwrap().contains("leaflet.markercluster"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Razão & <b>"), "Razão &amp; &lt;b&gt;");
        assert_eq!(script_json(&"</script>").unwrap(), "\"<\\/script>\"");
    }
}
