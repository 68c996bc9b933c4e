use crate::data::columns;
use crate::data::model::ProviderTable;
use crate::error::DataError;

pub const RACIAL_DIVERSITY: &str = "Racial Diversity";
pub const EXTIRPATION: &str = "Extirpation";

/// Masked metrics are shown under their public names.
const RENAMES: [(&str, &str); 2] = [
    (columns::MASKED_RACIAL_DIVERSITY, RACIAL_DIVERSITY),
    (columns::MASKED_EXTIRPATION, EXTIRPATION),
];

/// Columns of the detail table, in display order.
pub const DETAIL_COLUMNS: [&str; 8] = [
    columns::NPI,
    columns::ORG_NAME,
    columns::PRACTICE_ADDRESS,
    columns::MAILING_CITY,
    columns::MAILING_STATE,
    columns::CLAIMS,
    RACIAL_DIVERSITY,
    EXTIRPATION,
];

/// Rename the masked columns and project onto [`DETAIL_COLUMNS`].
pub fn detail_table(table: &ProviderTable) -> Result<ProviderTable, DataError> {
    let mut renamed = table.clone();
    renamed.rename(&RENAMES);
    renamed.select(&DETAIL_COLUMNS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, Column, ColumnType};

    fn text(name: &str, v: &str) -> Column {
        Column::new(name, ColumnType::Text, vec![CellValue::Text(v.into())])
    }

    #[test]
    fn projection_is_fixed_regardless_of_input_order() {
        let table = ProviderTable::from_columns(vec![
            text(columns::MASKED_EXTIRPATION, "<5%"),
            text(columns::EXTIRPATION_PCT, "0.031"),
            text(columns::MAILING_STATE, "OH"),
            text(columns::ORG_NAME, "Clinic"),
            Column::new(columns::CLAIMS, ColumnType::Float, vec![CellValue::Float(150.0)]),
            text(columns::MASKED_RACIAL_DIVERSITY, "10-20%"),
            text(columns::MAILING_CITY, "Columbus"),
            text(columns::NPI, "123"),
            text(columns::PRACTICE_ADDRESS, "1 Main St"),
            text(columns::NON_WHITE_PCT, "0.17"),
        ]);
        let detail = detail_table(&table).unwrap();
        assert_eq!(detail.column_names(), DETAIL_COLUMNS.to_vec());
        assert_eq!(
            detail.column(RACIAL_DIVERSITY).unwrap().values[0],
            CellValue::Text("10-20%".into())
        );
        assert_eq!(
            detail.column(EXTIRPATION).unwrap().values[0],
            CellValue::Text("<5%".into())
        );
    }

    #[test]
    fn missing_masked_column_is_an_error() {
        let table = ProviderTable::from_columns(vec![text(columns::NPI, "1")]);
        assert!(detail_table(&table).is_err());
    }
}
