use serde::Deserialize;

/// One entry of the fingerprinter's `report` array.
#[derive(Debug, Clone, Deserialize)]
pub struct WafReportEntry {
    pub detected: bool,
    pub firewall: String,
    #[serde(default)]
    pub manufacturer: String,
    pub url: String,
    #[serde(default)]
    pub trigger_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WafReport {
    pub report: Vec<WafReportEntry>,
}
