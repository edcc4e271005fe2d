use crate::config::AppConfig;
use crate::render::{escape_html, script_json};
use crate::types::DashboardData;
use anyhow::Result;
use serde_json::{json, Value};

const PAGE: &str = r#"<!doctype html>
<html lang="pt-BR">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>__TITLE__</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css" />
  <script src="https://cdn.plot.ly/plotly-2.35.2.min.js"></script>
  <style>
    body { background-color: #e0f2e9; padding: 20px; }
    h1 { text-align: center; color: #004d40; font-weight: bold; font-size: 36px; }
    h4.section { margin-top: 30px; color: #004d40; }
    .lead-text { text-align: center; font-size: 18px; }
    .counter { color: #2e7d32; }
    .table-wrap { overflow-x: auto; overflow-y: auto; height: 400px; }
  </style>
</head>
<body>
  <h1>__HEADING__</h1>
  <p class="lead-text">__DESCRIPTION__</p>

  <div class="row mb-4">
    <div class="col-6">
      <div class="card bg-success text-white"><div class="card-body">
        <h4 class="card-title">Total de Postos</h4>
        <h2 class="counter bg-white rounded px-2">__STATIONS__</h2>
      </div></div>
    </div>
    <div class="col-6">
      <div class="card bg-success text-white"><div class="card-body">
        <h4 class="card-title">Tancagem Total (m³)</h4>
        <h2 class="counter bg-white rounded px-2">__CAPACITY__</h2>
      </div></div>
    </div>
  </div>

  <div class="row">
    <div class="col-6"><div id="chart-product"></div></div>
    <div class="col-6"><div id="chart-municipality"></div></div>
  </div>

  <h4 class="section">Tabela de Tancagem por Produto e Município</h4>
  <div class="table-wrap">
    <table class="table table-sm table-striped bg-white">
      <thead><tr><th>Municipio</th><th>Produto</th><th>Tancagem (m³)</th></tr></thead>
      <tbody>
__TABLE_ROWS__
      </tbody>
    </table>
  </div>
__DROPPED__
  <hr />
  <h4 class="section">Mapa Interativo por Produto (com Camadas)</h4>
  <iframe src="__LAYERED_SRC__" width="100%" height="500"></iframe>

  <h4 class="section">Mapa com Cluster de Postos</h4>
  <iframe src="__CLUSTER_SRC__" width="100%" height="500"></iframe>

  <script>
    const charts = __CHARTS__;
    Plotly.newPlot("chart-product", charts.product.data, charts.product.layout);
    Plotly.newPlot("chart-municipality", charts.municipality.data, charts.municipality.layout);
  </script>
</body>
</html>
"#;

pub fn render_dashboard(data: &DashboardData, config: &AppConfig) -> Result<String> {
    let charts = json!({
        "product": product_chart(data),
        "municipality": municipality_chart(data),
    });

    let dropped = if data.dropped_rows > 0 {
        format!(
            "  <p class=\"text-muted mt-2\">{} registros sem coordenadas válidas foram ignorados.</p>\n",
            data.dropped_rows
        )
    } else {
        String::new()
    };

    Ok(PAGE
        .replace("__TITLE__", &escape_html(&config.dashboard.title))
        .replace("__HEADING__", &escape_html(&config.dashboard.heading))
        .replace("__DESCRIPTION__", &escape_html(&config.dashboard.description))
        .replace("__STATIONS__", &data.unique_stations.to_string())
        .replace("__CAPACITY__", &format_thousands(data.total_capacity_m3))
        .replace("__LAYERED_SRC__", &escape_html(&format!("/assets/{}", config.output.layered_map)))
        .replace("__CLUSTER_SRC__", &escape_html(&format!("/assets/{}", config.output.cluster_map)))
        .replace("__DROPPED__", &dropped)
        .replace("__TABLE_ROWS__", &table_rows(data))
        .replace("__CHARTS__", &script_json(&charts)?))
}

fn product_chart(data: &DashboardData) -> Value {
    let products: Vec<&str> = data.by_product.iter().map(|p| p.product.as_str()).collect();
    let capacities: Vec<f64> = data.by_product.iter().map(|p| p.capacity_m3).collect();

    json!({
        "data": [{ "type": "bar", "x": products, "y": capacities }],
        "layout": {
            "title": { "text": "Tancagem por Produto" },
            "xaxis": { "title": { "text": "Produto" } },
            "yaxis": { "title": { "text": "Tancagem (m³)" } },
        },
    })
}

// One stacked trace per product, in the same colors as the map layers.
fn municipality_chart(data: &DashboardData) -> Value {
    let traces: Vec<Value> = data.by_product.iter()
        .map(|p| {
            let product = p.product.as_str();
            let color = data.colors.color_for(product);
            let rows = data.by_municipality_product.iter().filter(|g| g.product == product);
            let (x, y): (Vec<&str>, Vec<f64>) = rows
                .map(|g| (g.municipality.as_str(), g.capacity_m3))
                .unzip();
            json!({
                "type": "bar",
                "name": product,
                "x": x,
                "y": y,
                "marker": { "color": color },
            })
        })
        .collect();

    json!({
        "data": traces,
        "layout": {
            "title": { "text": "Tancagem por Produto e Município" },
            "barmode": "relative",
            "xaxis": { "title": { "text": "Municipio" } },
            "yaxis": { "title": { "text": "Tancagem (m³)" } },
            "legend": { "title": { "text": "Produto" } },
        },
    })
}

fn table_rows(data: &DashboardData) -> String {
    data.by_municipality_product.iter()
        .map(|g| {
            format!(
                "        <tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&g.municipality),
                escape_html(&g.product),
                g.capacity_m3
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Integer part with `.` as the thousands separator, e.g. `1234567.8` -> `1.234.567`.
pub fn format_thousands(value: f64) -> String {
    let truncated = value.trunc() as i64;
    let digits = truncated.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    if truncated < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
