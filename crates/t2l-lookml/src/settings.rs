//! Project-wide rendering settings

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Value of the `connection:` line in every model file
    pub connection_name: String,
    /// Opening quote wrapped around physical identifiers
    pub quote_start: String,
    /// Closing quote wrapped around physical identifiers
    pub quote_end: String,
    /// `layout:` of generated dashboards
    pub dashboard_layout: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            connection_name: "connection_name".to_string(),
            quote_start: "`".to_string(),
            quote_end: "`".to_string(),
            dashboard_layout: "newspaper".to_string(),
        }
    }
}

impl ProjectSettings {
    /// Wrap a physical identifier in the configured quote pair
    pub fn quote(&self, ident: &str) -> String {
        format!("{}{}{}", self.quote_start, ident, self.quote_end)
    }
}
