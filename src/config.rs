use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{anyhow, Context, Result};

pub const DEFAULT_PALETTE: [&str; 9] = [
    "green", "red", "gray", "orange", "purple", "black", "blue", "pink", "cadetblue",
];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_source")]
    pub source: PathBuf,
    #[serde(default = "default_sheet")]
    pub sheet: String, // ignored for CSV sources
    #[serde(default)]
    pub columns: ColumnsConfig,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            sheet: default_sheet(),
            columns: ColumnsConfig::default(),
        }
    }
}

/// Header names in the source sheet. Matched exactly, accents included.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ColumnsConfig {
    pub station_id: String,
    pub company_name: String,
    pub municipality: String,
    pub product: String,
    pub capacity: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            station_id: "CNPJ".to_string(),
            company_name: "Razão Social".to_string(),
            municipality: "MUNICÍPIO".to_string(),
            product: "Produto".to_string(),
            capacity: "Tancagem (m³)".to_string(),
            latitude: "LATITUDE".to_string(),
            longitude: "LONGITUDE".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub palette: Vec<String>,
    pub zoom_start: u8,
    pub fallback_center: [f64; 2], // [lat, lon]
    pub min_radius: f64,
    pub radius_divisor: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            zoom_start: 8,
            fallback_center: [-7.12, -36.72],
            min_radius: 5.0,
            radius_divisor: 500.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub asset_dir: PathBuf,
    pub layered_map: String,
    pub cluster_map: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            layered_map: "mapa_postos_usinas.html".to_string(),
            cluster_map: "mapa_simples.html".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: [u8; 4],
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: [127, 0, 0, 1],
            port: 8050,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub heading: String,
    pub description: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Painel de Tancagem - Paraíba".to_string(),
            heading: "Painel de Tancagem e Localização de Postos na Paraíba".to_string(),
            description: "Este dashboard interativo mostra a distribuição dos tanques de \
                combustível nos postos do estado da Paraíba, incluindo estatísticas por \
                produto e por município, bem como a localização exata dos estabelecimentos."
                .to_string(),
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from("base1.xlsx")
}

fn default_sheet() -> String {
    "Folha1".to_string()
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when it exists; otherwise the built-in defaults.
    /// An explicitly requested file that is missing is an error.
    pub fn load_or_default(path: &Path, explicit: bool) -> Result<Self> {
        if path.exists() || explicit {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.map.radius_divisor.is_finite() || self.map.radius_divisor <= 0.0 {
            return Err(anyhow!("map.radius_divisor must be positive, got {}", self.map.radius_divisor));
        }
        if !self.map.min_radius.is_finite() || self.map.min_radius <= 0.0 {
            return Err(anyhow!("map.min_radius must be positive, got {}", self.map.min_radius));
        }
        let [lat, lon] = self.map.fallback_center;
        if !lat.is_finite() || !lon.is_finite() {
            return Err(anyhow!("map.fallback_center must be finite"));
        }
        Ok(())
    }

    pub fn layered_map_path(&self) -> PathBuf {
        self.output.asset_dir.join(&self.output.layered_map)
    }

    pub fn cluster_map_path(&self) -> PathBuf {
        self.output.asset_dir.join(&self.output.cluster_map)
    }
}
