use crate::data::columns;
use crate::data::model::{ProviderTable, format_float};
use crate::error::DataError;

/// The two headline numbers above the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryMetrics {
    /// Sum of the claim-count column.
    pub total_claims: f64,
    /// Non-missing organisation identifiers.
    pub facility_count: usize,
}

impl SummaryMetrics {
    pub fn compute(table: &ProviderTable) -> Result<Self, DataError> {
        Ok(SummaryMetrics {
            total_claims: table.require(columns::CLAIMS)?.sum(),
            facility_count: table.require(columns::NPI)?.count(),
        })
    }

    pub fn claims_label(&self) -> String {
        group_float(self.total_claims)
    }

    pub fn facilities_label(&self) -> String {
        group_digits(&self.facility_count.to_string())
    }
}

/// `1234567.5` → `1,234,567.5`; whole numbers keep a trailing `.0`.
pub fn group_float(v: f64) -> String {
    let text = format_float(v);
    match text.split_once('.') {
        Some((int, frac)) => format!("{}.{frac}", group_digits(int)),
        None => group_digits(&text),
    }
}

/// Insert thousands separators into an integer literal.
pub fn group_digits(int: &str) -> String {
    let (sign, digits) = match int.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int),
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return int.to_string();
    }
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("{sign}{out}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, Column, ColumnType};

    #[test]
    fn totals_and_counts() {
        let table = ProviderTable::from_columns(vec![
            Column::new(
                columns::NPI,
                ColumnType::Text,
                vec![
                    CellValue::Text("1".into()),
                    CellValue::Null,
                    CellValue::Text("3".into()),
                ],
            ),
            Column::new(
                columns::CLAIMS,
                ColumnType::Float,
                vec![CellValue::Float(150.0), CellValue::Float(50.0), CellValue::Null],
            ),
        ]);
        let metrics = SummaryMetrics::compute(&table).unwrap();
        assert_eq!(metrics.total_claims, 200.0);
        assert_eq!(metrics.facility_count, 2);
        assert_eq!(metrics.claims_label(), "200.0");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(group_float(1_234_567.5), "1,234,567.5");
        assert_eq!(group_float(500.0), "500.0");
        assert_eq!(group_float(-1000.0), "-1,000.0");
        assert_eq!(group_digits("1234"), "1,234");
        assert_eq!(group_digits("123"), "123");
    }

    #[test]
    fn missing_columns_are_errors() {
        assert!(SummaryMetrics::compute(&ProviderTable::default()).is_err());
    }
}
