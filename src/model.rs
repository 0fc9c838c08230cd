use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time-to-live requested for every export token.
pub const EXPORT_TOKEN_TTL_SECONDS: u64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ClientConfig {
    /// Normalize user-provided settings: trailing slashes are trimmed and a blank key means no key.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Self { base_url, api_key }
    }
}

/// Conversion strategy passed through to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Plan,
    Product,
    Code,
    Decision,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Plan, Mode::Product, Mode::Code, Mode::Decision];

    /// Wire value sent in the convert request.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Plan => "plan",
            Mode::Product => "product",
            Mode::Code => "code",
            Mode::Decision => "decision",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Plan => "Plan",
            Mode::Product => "Product",
            Mode::Code => "Code",
            Mode::Decision => "Decision",
        }
    }

    pub fn next(self) -> Mode {
        let i = Mode::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Mode::ALL[(i + 1) % Mode::ALL.len()]
    }

    pub fn prev(self) -> Mode {
        let i = Mode::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Mode::ALL[(i + Mode::ALL.len() - 1) % Mode::ALL.len()]
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plan" => Ok(Mode::Plan),
            "product" => Ok(Mode::Product),
            "code" => Ok(Mode::Code),
            "decision" => Ok(Mode::Decision),
            other => Err(format!(
                "unknown mode '{other}' (expected plan, product, code or decision)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertRequest<'a> {
    pub raw_input: &'a str,
    pub mode: Mode,
}

/// Convert reply; only `id` is consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub id: String,
}

/// A structured output record produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub structured_output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    // Kept as a string: the engine accepts modes this client does not know about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<String>,
}

impl Artifact {
    /// Pretty-printed structured output, as shown in the artifact panel.
    pub fn pretty_output(&self) -> String {
        serde_json::to_string_pretty(&self.structured_output)
            .unwrap_or_else(|_| self.structured_output.to_string())
    }

    /// `created_at` rendered for humans; unparseable timestamps are shown verbatim.
    pub fn created_display(&self) -> Option<String> {
        let raw = self.created_at.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let parsed = time::OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339);
        let fmt = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
        Some(
            parsed
                .ok()
                .and_then(|t| t.to_offset(time::UtcOffset::UTC).format(&fmt).ok())
                .unwrap_or_else(|| raw.to_string()),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportTokenRequest<'a> {
    pub artifact_id: &'a str,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportToken {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Body and suggested file name of a downloaded export.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}
