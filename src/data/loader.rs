use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::timezone::Tz;
use arrow::array::{Array, AsArray};
use chrono::TimeZone;
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    TimeUnit, TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::temporal_conversions::{
    date32_to_datetime, timestamp_ms_to_datetime, timestamp_ns_to_datetime,
    timestamp_s_to_datetime, timestamp_us_to_datetime,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::columns;
use super::model::{CellValue, Column, ColumnType, ProviderTable};
use crate::error::DataError;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the provider claims table from a file and apply the load-time
/// coercions and the per-state aggregate.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row plus one record per line (the CMS extract)
/// * `.parquet` – the same schema written by a dataframe library
pub fn load_file(path: &Path) -> Result<ProviderTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let raw = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            read_csv(file)?
        }
        "parquet" | "pq" => read_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let table = prepare(raw).with_context(|| format!("preparing {}", path.display()))?;
    log::info!(
        "Loaded {} provider records with {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

/// Same as [`load_file`] for CSV content from any reader.
pub fn load_csv_reader<R: Read>(reader: R) -> Result<ProviderTable> {
    let raw = read_csv(reader)?;
    Ok(prepare(raw)?)
}

// ---------------------------------------------------------------------------
// Load-time shaping
// ---------------------------------------------------------------------------

/// Coerce identifiers to text and claims to float, then join the per-state
/// claim total onto every record.
pub fn prepare(mut table: ProviderTable) -> Result<ProviderTable, DataError> {
    for name in columns::IDENTIFIERS {
        coerce_to_text(&mut table, name)?;
    }
    coerce_claims(&mut table)?;
    attach_state_totals(&mut table)?;
    Ok(table)
}

fn coerce_to_text(table: &mut ProviderTable, name: &str) -> Result<(), DataError> {
    let column = table
        .column_mut(name)
        .ok_or_else(|| DataError::MissingColumn(name.to_string()))?;
    for value in &mut column.values {
        *value = match std::mem::replace(value, CellValue::Null) {
            CellValue::Null => CellValue::Null,
            CellValue::Text(s) => CellValue::Text(s),
            other => CellValue::Text(other.to_string()),
        };
    }
    column.dtype = ColumnType::Text;
    Ok(())
}

fn coerce_claims(table: &mut ProviderTable) -> Result<(), DataError> {
    let column = table
        .column_mut(columns::CLAIMS)
        .ok_or_else(|| DataError::MissingColumn(columns::CLAIMS.to_string()))?;

    for (row, value) in column.values.iter_mut().enumerate() {
        let claims = match &*value {
            CellValue::Null => continue,
            CellValue::Text(s) => s.trim().parse::<f64>().map_err(|_| DataError::Coercion {
                column: columns::CLAIMS.to_string(),
                row,
                value: s.clone(),
                target: "float",
            })?,
            CellValue::Date(d) => {
                return Err(DataError::Coercion {
                    column: columns::CLAIMS.to_string(),
                    row,
                    value: d.to_string(),
                    target: "float",
                });
            }
            other => match other.as_f64() {
                Some(v) => v,
                None => continue,
            },
        };
        if claims < 0.0 {
            return Err(DataError::NegativeClaims { row, value: claims });
        }
        *value = CellValue::Float(claims);
    }
    column.dtype = ColumnType::Float;
    Ok(())
}

/// Sum of claim counts per mailing-address state.  Rows without a state
/// are left out of every group.
pub fn state_claim_totals(table: &ProviderTable) -> Result<BTreeMap<String, f64>, DataError> {
    let states = table.require(columns::MAILING_STATE)?;
    let claims = table.require(columns::CLAIMS)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for (state, claim) in states.values.iter().zip(&claims.values) {
        if state.is_null() {
            continue;
        }
        *totals.entry(state.to_string()).or_default() += claim.as_f64().unwrap_or(0.0);
    }
    Ok(totals)
}

fn attach_state_totals(table: &mut ProviderTable) -> Result<(), DataError> {
    let totals = state_claim_totals(table)?;
    let states = table.require(columns::MAILING_STATE)?;
    let values = states
        .values
        .iter()
        .map(|state| {
            if state.is_null() {
                return CellValue::Null;
            }
            totals
                .get(&state.to_string())
                .map_or(CellValue::Null, |t| CellValue::Float(*t))
        })
        .collect();
    table.push_column(Column::new(
        columns::STATE_CLAIM_TOTAL,
        ColumnType::Float,
        values,
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

/// Parse CSV into a raw table, inferring each column's type from its
/// values.  Empty cells are missing values.
pub fn read_csv<R: Read>(reader: R) -> Result<ProviderTable> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() != headers.len() {
            bail!(
                "CSV row {row_no}: expected {} fields, found {}",
                headers.len(),
                record.len()
            );
        }
        for (col_idx, value) in record.iter().enumerate() {
            raw[col_idx].push(value.to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, values)| infer_column(name, values))
        .collect();
    Ok(ProviderTable::from_columns(columns))
}

fn infer_column(name: String, raw: Vec<String>) -> Column {
    let present = || raw.iter().filter(|s| !s.is_empty());

    let dtype = if present().next().is_none() {
        ColumnType::Float
    } else if present().all(|s| s.parse::<i64>().is_ok()) {
        ColumnType::Integer
    } else if present().all(|s| s.parse::<f64>().is_ok()) {
        ColumnType::Float
    } else if present().all(|s| parse_bool(s).is_some()) {
        ColumnType::Bool
    } else {
        ColumnType::Text
    };

    let values = raw
        .into_iter()
        .map(|s| {
            if s.is_empty() {
                return CellValue::Null;
            }
            match dtype {
                ColumnType::Integer => s.parse().map_or(CellValue::Null, CellValue::Integer),
                ColumnType::Float => s.parse().map_or(CellValue::Null, CellValue::Float),
                ColumnType::Bool => parse_bool(&s).map_or(CellValue::Null, CellValue::Bool),
                _ => CellValue::Text(s),
            }
        })
        .collect();

    Column::new(name, dtype, values)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Read a Parquet file into a raw table.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).  Dictionary-encoded string columns
/// (pandas `category`) load as [`ColumnType::Category`].
pub fn read_parquet(path: &Path) -> Result<ProviderTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|f| Column::new(f.name().clone(), column_type(f.data_type()), Vec::new()))
        .collect();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            for row in 0..batch.num_rows() {
                let value = extract_cell(array, row)
                    .with_context(|| format!("column '{}', row {row}", column.name))?;
                column.values.push(value);
            }
        }
    }

    Ok(ProviderTable::from_columns(columns))
}

fn column_type(data_type: &DataType) -> ColumnType {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => ColumnType::Text,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => ColumnType::Integer,
        DataType::Float32 | DataType::Float64 => ColumnType::Float,
        DataType::Boolean => ColumnType::Bool,
        DataType::Date32 | DataType::Timestamp(_, _) => ColumnType::Date,
        DataType::Dictionary(_, _) => ColumnType::Category,
        _ => ColumnType::Text,
    }
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Result<CellValue> {
    if col.is_null(row) {
        return Ok(CellValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => CellValue::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => CellValue::Integer(col.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => CellValue::Integer(col.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => CellValue::Integer(col.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => CellValue::Integer(col.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => CellValue::Integer(col.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            CellValue::Integer(i64::try_from(v).context("unsigned value out of range")?)
        }
        DataType::Float32 => {
            CellValue::Float(col.as_primitive::<Float32Type>().value(row).into())
        }
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Date32 => {
            let days = col.as_primitive::<Date32Type>().value(row);
            date32_to_datetime(days).map_or(CellValue::Null, CellValue::Date)
        }
        DataType::Timestamp(unit, tz) => {
            let utc = match unit {
                TimeUnit::Second => {
                    timestamp_s_to_datetime(col.as_primitive::<TimestampSecondType>().value(row))
                }
                TimeUnit::Millisecond => timestamp_ms_to_datetime(
                    col.as_primitive::<TimestampMillisecondType>().value(row),
                ),
                TimeUnit::Microsecond => timestamp_us_to_datetime(
                    col.as_primitive::<TimestampMicrosecondType>().value(row),
                ),
                TimeUnit::Nanosecond => timestamp_ns_to_datetime(
                    col.as_primitive::<TimestampNanosecondType>().value(row),
                ),
            };
            // Zoned values keep their local wall-clock time and lose the zone.
            match (utc, tz) {
                (Some(utc), Some(tz)) => {
                    let tz: Tz = tz.parse().context("parsing timestamp time zone")?;
                    CellValue::Date(tz.from_utc_datetime(&utc).naive_local())
                }
                (utc, _) => utc.map_or(CellValue::Null, CellValue::Date),
            }
        }
        DataType::Dictionary(key, _) => {
            let (keys_idx, values) = match key.as_ref() {
                DataType::Int8 => {
                    let d = col.as_dictionary::<Int8Type>();
                    (d.keys().value(row) as usize, d.values().clone())
                }
                DataType::Int16 => {
                    let d = col.as_dictionary::<Int16Type>();
                    (d.keys().value(row) as usize, d.values().clone())
                }
                DataType::Int32 => {
                    let d = col.as_dictionary::<Int32Type>();
                    (d.keys().value(row) as usize, d.values().clone())
                }
                DataType::Int64 => {
                    let d = col.as_dictionary::<Int64Type>();
                    (d.keys().value(row) as usize, d.values().clone())
                }
                other => bail!("unsupported dictionary key type {other:?}"),
            };
            match extract_cell(&values, keys_idx)? {
                CellValue::Text(s) => CellValue::Text(s),
                CellValue::Null => CellValue::Null,
                other => CellValue::Text(other.to_string()),
            }
        }
        other => CellValue::Text(format!("{other:?}")),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ORG_NPI_NUM,ZIP_CODE,Claims,Provider Business Mailing Address State Name,Final_Latitude\n";

    fn load(body: &str) -> Result<ProviderTable> {
        load_csv_reader(format!("{HEADER}{body}").as_bytes())
    }

    #[test]
    fn identifiers_become_text_and_claims_float() {
        let table = load("1234567890,43210,150,OH,40.0\n").unwrap();
        let npi = table.column(columns::NPI).unwrap();
        assert_eq!(npi.dtype, ColumnType::Text);
        assert_eq!(npi.values[0], CellValue::Text("1234567890".into()));
        let zip = table.column(columns::ZIP_CODE).unwrap();
        assert_eq!(zip.values[0], CellValue::Text("43210".into()));
        let claims = table.column(columns::CLAIMS).unwrap();
        assert_eq!(claims.dtype, ColumnType::Float);
        assert_eq!(claims.values[0], CellValue::Float(150.0));
        let lat = table.column(columns::LATITUDE).unwrap();
        assert_eq!(lat.dtype, ColumnType::Float);
    }

    #[test]
    fn state_totals_are_joined_onto_every_row() {
        let table = load("1,1,150,OH,40\n2,2,50,OH,41\n3,3,300,CA,36\n").unwrap();
        let totals = table.column(columns::STATE_CLAIM_TOTAL).unwrap();
        assert_eq!(
            totals.values,
            vec![
                CellValue::Float(200.0),
                CellValue::Float(200.0),
                CellValue::Float(300.0)
            ]
        );
        let by_state = state_claim_totals(&table).unwrap();
        assert_eq!(by_state.get("OH"), Some(&200.0));
        assert_eq!(by_state.get("CA"), Some(&300.0));
    }

    #[test]
    fn rows_without_state_get_no_total() {
        let table = load("1,1,10,,40\n2,2,20,TX,41\n").unwrap();
        let totals = table.column(columns::STATE_CLAIM_TOTAL).unwrap();
        assert_eq!(totals.values, vec![CellValue::Null, CellValue::Float(20.0)]);
    }

    #[test]
    fn non_numeric_claims_fail_the_load() {
        let err = load("1,1,many,OH,40\n").unwrap_err();
        let data_err = err.downcast_ref::<DataError>().unwrap();
        assert!(matches!(data_err, DataError::Coercion { row: 0, .. }));
    }

    #[test]
    fn negative_claims_fail_the_load() {
        let err = load("1,1,-5,OH,40\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::NegativeClaims { .. })
        ));
    }

    #[test]
    fn missing_claims_column_fails_the_load() {
        let err = load_csv_reader("ORG_NPI_NUM,ZIP_CODE\n1,2\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::MissingColumn(name)) if name == columns::CLAIMS
        ));
    }

    #[test]
    fn column_types_are_inferred() {
        let raw = read_csv("a,b,c,d\n1,1.5,true,x\n2,,false,3\n".as_bytes()).unwrap();
        let types: Vec<_> = raw.columns().iter().map(|c| c.dtype).collect();
        assert_eq!(
            types,
            vec![ColumnType::Integer, ColumnType::Float, ColumnType::Bool, ColumnType::Text]
        );
        assert_eq!(raw.column("b").unwrap().values[1], CellValue::Null);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(read_csv("a,b\n1\n".as_bytes()).is_err());
    }

    #[test]
    fn parquet_columns_keep_their_types() {
        use arrow::array::{
            ArrayRef, DictionaryArray, Float64Array, StringArray, TimestampMillisecondArray,
        };
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let kinds: DictionaryArray<Int32Type> = vec!["Dental", "Oral Surgery", "Dental"]
            .into_iter()
            .collect();
        // 2024-03-01T10:00:00Z, 12:00 on the wall clock at +02:00.
        let seen = TimestampMillisecondArray::from(vec![1_709_287_200_000, 1_709_287_200_000, 0])
            .with_timezone("+02:00");
        let batch = RecordBatch::try_from_iter(vec![
            (
                "name",
                Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef,
            ),
            ("kind", Arc::new(kinds) as ArrayRef),
            (
                "Claims",
                Arc::new(Float64Array::from(vec![150.0, 50.0, 300.0])) as ArrayRef,
            ),
            ("seen", Arc::new(seen) as ArrayRef),
        ])
        .unwrap();

        let path = std::env::temp_dir().join(format!(
            "patient-density-loader-{}.parquet",
            std::process::id()
        ));
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = read_parquet(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let types: Vec<_> = table.columns().iter().map(|c| c.dtype).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Text,
                ColumnType::Category,
                ColumnType::Float,
                ColumnType::Date
            ]
        );
        assert_eq!(
            table.column("kind").unwrap().values[1],
            CellValue::Text("Oral Surgery".into())
        );
        assert_eq!(
            table.column("Claims").unwrap().values[2],
            CellValue::Float(300.0)
        );
        let noon = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let seen = &table.column("seen").unwrap().values;
        assert_eq!(seen[0], CellValue::Date(noon));
        assert_eq!(
            seen[2],
            CellValue::Date(
                chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
                    .unwrap()
                    .and_hms_opt(2, 0, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        assert!(load_file(Path::new("claims.xlsx")).is_err());
    }
}
