use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::Result;
use crate::structs::{format_time, Period, TimeSeries};

const CHART_TEMPLATE: &str = include_str!("../templates/chart.html.tera");
const PAGE_TEMPLATE: &str = include_str!("../templates/page.html.tera");

const CHART_ID: &str = "apr_history";
const THEME: &str = "westeros";

/// ECharts `option` document for a line chart of every asset.
#[derive(Serialize, Debug, PartialEq)]
pub struct LineChart {
    title: Title,
    tooltip: Tooltip,
    legend: Legend,
    #[serde(rename = "xAxis")]
    x_axis: CategoryAxis,
    #[serde(rename = "yAxis")]
    y_axis: ValueAxis,
    series: Vec<LineSeries>,
}

#[derive(Serialize, Debug, PartialEq)]
struct Title {
    text: String,
    subtext: String,
}

#[derive(Serialize, Debug, PartialEq)]
struct Tooltip {
    trigger: &'static str,
}

#[derive(Serialize, Debug, PartialEq)]
struct Legend {
    show: bool,
    data: Vec<String>,
}

#[derive(Serialize, Debug, PartialEq)]
struct CategoryAxis {
    #[serde(rename = "type")]
    kind: &'static str,
    data: Vec<String>,
}

#[derive(Serialize, Debug, PartialEq)]
struct ValueAxis {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize, Debug, PartialEq)]
struct LineSeries {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    smooth: bool,
    #[serde(rename = "connectNulls")]
    connect_nulls: bool,
    data: Vec<Option<f64>>,
}

impl LineChart {
    pub fn from_time_series(ts: &TimeSeries) -> Self {
        let series: Vec<LineSeries> = ts
            .series()
            .iter()
            .map(|s| LineSeries {
                name: s.asset.clone(),
                kind: "line",
                smooth: true,
                connect_nulls: false,
                data: s.points.clone(),
            })
            .collect();
        Self {
            title: Title {
                text: "Binance Earn APR History".to_string(),
                subtext: format!("{} view", ts.period()),
            },
            tooltip: Tooltip { trigger: "axis" },
            legend: Legend {
                show: true,
                data: series.iter().map(|s| s.name.clone()).collect(),
            },
            x_axis: CategoryAxis {
                kind: "category",
                data: ts.dates().iter().map(format_time).collect(),
            },
            y_axis: ValueAxis { kind: "value" },
            series,
        }
    }

    /// JSON safe to inline inside a `<script>` element.
    pub fn to_script_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?.replace('<', "\\u003c"))
    }
}

/// Navigation entry handed to the page template.
#[derive(Serialize, Debug)]
struct PeriodLink {
    name: Period,
    path: String,
}

/// Renders chart pages; cheap to clone.
#[derive(Clone)]
pub struct ChartRenderer {
    tera: Arc<Tera>,
}

impl ChartRenderer {
    /// `page_template` replaces the built-in page layout when given.
    pub fn new(page_template: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template("chart.html", CHART_TEMPLATE)?;
        match page_template {
            Some(path) => tera.add_template_file(path, Some("page.html"))?,
            None => tera.add_raw_template("page.html", PAGE_TEMPLATE)?,
        }
        Ok(Self { tera: Arc::new(tera) })
    }

    pub fn render_chart(&self, ts: &TimeSeries) -> Result<String> {
        let mut context = Context::new();
        context.insert("chart_id", CHART_ID);
        context.insert("theme", THEME);
        context.insert("width", "900px");
        context.insert("height", "500px");
        context.insert("option", &LineChart::from_time_series(ts).to_script_json()?);
        Ok(self.tera.render("chart.html", &context)?)
    }

    pub fn render_page(&self, ts: &TimeSeries) -> Result<String> {
        let window = ts.window();
        let nav = window.navigation();
        let mut context = Context::new();
        context.insert("chart", &self.render_chart(ts)?);
        context.insert("period", &ts.period());
        let links: Vec<PeriodLink> = Period::EVERY
            .iter()
            .map(|p| PeriodLink { name: *p, path: p.path() })
            .collect();
        context.insert("periods", &links);
        context.insert("path", &ts.period().path());
        context.insert("navigable", &ts.period().is_navigable());
        context.insert("shift", &window.shift);
        context.insert("older", &nav.older);
        context.insert("newer", &nav.newer);
        context.insert("empty", &ts.is_empty());
        context.insert(
            "window_start",
            &window.min.as_ref().map(format_time).unwrap_or_else(|| "the beginning".to_string()),
        );
        context.insert("window_end", &format_time(&window.max));
        Ok(self.tera.render("page.html", &context)?)
    }
}

#[cfg(test)]
fn sample(now_day: u32) -> TimeSeries {
    use chrono::{TimeZone, Utc};
    use crate::structs::{Snapshot, Window};

    let day = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
    let snapshot = Snapshot::from_observations(vec![
        (day(1), "BTC", 0.05),
        (day(3), "BTC", 0.07),
        (day(2), "ETH", 0.10),
    ]);
    TimeSeries::from_snapshot(&snapshot, Window::resolve(Period::Week, 0, day(now_day)))
}

#[test]
pub fn test_option_document_has_nulls_for_gaps() {
    let chart = LineChart::from_time_series(&sample(4));
    let json: serde_json::Value = serde_json::from_str(&chart.to_script_json().unwrap()).unwrap();
    assert_eq!(json["xAxis"]["data"][0], "2024-01-01 00:00:00");
    assert_eq!(json["series"][0]["name"], "BTC");
    assert_eq!(json["series"][0]["data"], serde_json::json!([0.05, null, 0.07]));
    assert_eq!(json["series"][1]["data"], serde_json::json!([null, 0.10, null]));
    assert_eq!(json["legend"]["data"], serde_json::json!(["BTC", "ETH"]));
}

#[test]
pub fn test_script_json_escapes_markup() {
    use chrono::{TimeZone, Utc};
    use crate::structs::{Snapshot, Window};

    let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let snapshot = Snapshot::from_observations(vec![(t, "</script>", 0.01)]);
    let ts = TimeSeries::from_snapshot(&snapshot, Window::resolve(Period::All, 0, Utc::now()));
    let json = LineChart::from_time_series(&ts).to_script_json().unwrap();
    assert!(!json.contains("</script>"));
}

#[test]
pub fn test_page_contains_chart_and_navigation() {
    let renderer = ChartRenderer::new(None).unwrap();
    let page = renderer.render_page(&sample(4)).unwrap();
    assert!(page.contains("id=\"apr_history\""));
    assert!(page.contains("/week?shift=-1"));
    assert!(!page.contains("newer"));
    assert!(page.contains("\"name\":\"ETH\""));
}

#[test]
pub fn test_empty_window_renders_notice() {
    let renderer = ChartRenderer::new(None).unwrap();
    let page = renderer.render_page(&sample(20)).unwrap();
    assert!(page.contains("No observations between"));
}

#[test]
pub fn test_custom_page_template() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.html");
    std::fs::write(&path, "<main>{{ period }}|{{ older }}|{{ newer }}</main>{{ chart | safe }}").unwrap();
    let renderer = ChartRenderer::new(Some(&path)).unwrap();
    let page = renderer.render_page(&sample(4)).unwrap();
    assert!(page.starts_with("<main>week|-1|0</main>"));
}

#[test]
pub fn test_page_links_use_period_paths() {
    let renderer = ChartRenderer::new(None).unwrap();
    let page = renderer.render_page(&sample(4)).unwrap();
    for p in Period::EVERY {
        assert!(page.contains(&format!("href=\"{}\"", p.path())));
    }
    assert!(page.contains("<a href=\"/week\" class=\"current\">week</a>"));
}
