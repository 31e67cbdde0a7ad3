use reqwest::Url;
use serde_json::json;

use crate::models::TrendPoint;

const QUICKCHART_BASE: &str = "https://quickchart.io/chart";

/// Builds a QuickChart line-chart URL for the fetched series. Purely a
/// string transform; whether anything ever renders it is the recipient's
/// business.
pub fn chart_url(keyword: &str, points: &[TrendPoint]) -> String {
    let config = json!({
        "type": "line",
        "data": {
            "labels": points.iter().map(|p| p.label.as_str()).collect::<Vec<_>>(),
            "datasets": [{
                "label": keyword,
                "data": points.iter().map(|p| p.interest).collect::<Vec<_>>(),
                "borderColor": "rgb(37, 99, 235)",
                "backgroundColor": "rgba(37, 99, 235, 0.2)",
                "fill": true,
                "tension": 0.3,
            }],
        },
        "options": {
            "plugins": { "legend": { "display": false } },
            "scales": { "y": { "beginAtZero": true } },
        },
    });

    match Url::parse_with_params(QUICKCHART_BASE, &[("c", config.to_string())]) {
        Ok(url) => url.into(),
        // The base URL is static and valid; this arm is unreachable.
        Err(_) => QUICKCHART_BASE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_embeds_the_series_as_chart_config() {
        let points = vec![
            TrendPoint {
                label: "2026-07-27".to_string(),
                interest: 50,
            },
            TrendPoint {
                label: "2026-08-03".to_string(),
                interest: 65,
            },
        ];
        let url = chart_url("sourdough", &points);
        assert!(url.starts_with("https://quickchart.io/chart?c="));

        let parsed = Url::parse(&url).unwrap();
        let (_, config) = parsed
            .query_pairs()
            .find(|(name, _)| name == "c")
            .unwrap();
        let config: serde_json::Value = serde_json::from_str(&config).unwrap();
        assert_eq!(config["type"], "line");
        assert_eq!(config["data"]["labels"][1], "2026-08-03");
        assert_eq!(config["data"]["datasets"][0]["label"], "sourdough");
        assert_eq!(config["data"]["datasets"][0]["data"][1], 65);
    }

    #[test]
    fn empty_series_still_produces_a_well_formed_url() {
        let url = chart_url("sourdough", &[]);
        assert!(Url::parse(&url).is_ok());
    }
}
