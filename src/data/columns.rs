//! Column names of the CMS provider claims extract.

pub const NPI: &str = "ORG_NPI_NUM";
pub const ZIP_CODE: &str = "ZIP_CODE";
pub const CLAIMS: &str = "Claims";
pub const ORG_NAME: &str = "Provider Organization Name (Legal Business Name)";
pub const PRACTICE_ADDRESS: &str = "Provider First Line Business Practice Location Address";
pub const MAILING_CITY: &str = "Provider Business Mailing Address City Name";
pub const MAILING_STATE: &str = "Provider Business Mailing Address State Name";
pub const LATITUDE: &str = "Final_Latitude";
pub const LONGITUDE: &str = "Final_Longitude";
pub const NON_WHITE_PCT: &str = "% non-white";
pub const MASKED_RACIAL_DIVERSITY: &str = "Masked Racial Diversity";
pub const EXTIRPATION_PCT: &str = "% treated with extirpation";
pub const MASKED_EXTIRPATION: &str = "Masked Extirpation";

/// Full state name used to key the choropleth, when the extract carries it.
pub const MAPPED_STATE_NAME: &str = "Mapped_State_Name";

/// Derived: per-state claim total joined back onto every row.
pub const STATE_CLAIM_TOTAL: &str = "State_Level_Claim_Count";

/// Identifier-like columns that are always treated as opaque text.
pub const IDENTIFIERS: [&str; 2] = [NPI, ZIP_CODE];
