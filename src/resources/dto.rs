use serde::Deserialize;

/// Listing filters. `page` stays a string so a non-numeric value coerces to
/// page 1 instead of failing query deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    pub name: Option<String>,
    pub categories: Option<String>,
    pub page: Option<String>,
}
