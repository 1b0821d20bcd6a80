use serde::Deserialize;

/// One aggregate bar as returned by the Polygon aggregates endpoints.
#[derive(Deserialize, Debug)]
pub struct PolygonAgg {
    /// Ticker. Present on grouped and previous-close results.
    #[serde(rename = "T", default)]
    pub ticker: Option<String>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    /// Volume arrives as a float on the wire.
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(rename = "vw", default)]
    pub vwap: Option<f64>,
    /// Window start, Unix milliseconds.
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "n", default)]
    pub trade_count: Option<u64>,
}

/// Envelope shared by the grouped-daily and previous-close endpoints.
#[derive(Deserialize, Debug)]
pub struct AggsResponse {
    #[serde(default)]
    pub status: String,
    #[serde(rename = "resultsCount", default)]
    pub results_count: usize,
    /// Omitted (or null) when the vendor has nothing for the request.
    #[serde(default)]
    pub results: Option<Vec<PolygonAgg>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_grouped_payload() {
        let body = r#"{
            "adjusted": true, "queryCount": 2, "resultsCount": 2, "status": "OK",
            "results": [
                {"T":"AAPL","v":52164465.0,"vw":169.1,"o":170.0,"c":169.12,"h":171.24,"l":168.0,"t":1709758800000,"n":600000},
                {"T":"TINY","v":100,"o":0,"c":1.5,"h":1.5,"l":0,"t":1709758800000}
            ]
        }"#;
        let resp: AggsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.status, "OK");
        assert_eq!(resp.results_count, 2);
        let results = resp.results.unwrap();
        assert_eq!(results[0].ticker.as_deref(), Some("AAPL"));
        assert_eq!(results[1].vwap, None);
        assert_eq!(results[1].trade_count, None);
    }

    #[test]
    fn missing_results_is_none() {
        let resp: AggsResponse =
            serde_json::from_str(r#"{"status":"OK","queryCount":0,"resultsCount":0}"#).unwrap();
        assert!(resp.results.is_none());
    }
}
