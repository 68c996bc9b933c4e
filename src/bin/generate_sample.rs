use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::json;

/// Coarse state boxes: (abbreviation, full name, west, south, east, north).
const STATES: [(&str, &str, f64, f64, f64, f64); 8] = [
    ("OH", "Ohio", -84.8, 38.4, -80.5, 42.0),
    ("CA", "California", -124.4, 32.5, -114.1, 42.0),
    ("TX", "Texas", -106.6, 25.8, -93.5, 36.5),
    ("NY", "New York", -79.8, 40.5, -71.9, 45.0),
    ("FL", "Florida", -87.6, 24.5, -80.0, 31.0),
    ("IL", "Illinois", -91.5, 37.0, -87.5, 42.5),
    ("GA", "Georgia", -85.6, 30.4, -80.8, 35.0),
    ("WA", "Washington", -124.8, 45.5, -116.9, 49.0),
];

const CITIES: [&str; 6] = ["Springfield", "Riverside", "Franklin", "Greenville", "Madison", "Salem"];
const STREETS: [&str; 5] = ["Main St", "Oak Ave", "Maple Dr", "Park Blvd", "Cedar Ln"];
const KINDS: [&str; 4] = ["Dental", "Oral Surgery", "Endodontics", "Family Dentistry"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

/// Public bucket for a raw share, e.g. `0.23` → `20-30%`.
fn mask_percentage(share: f64) -> String {
    let pct = (share * 100.0).clamp(0.0, 100.0);
    if pct < 10.0 {
        "<10%".to_string()
    } else {
        let lo = (pct / 10.0).floor() as u32 * 10;
        format!("{lo}-{}%", (lo + 10).min(100))
    }
}

struct Row {
    npi: String,
    zip: String,
    claims: f64,
    name: String,
    address: String,
    city: String,
    state: String,
    mapped_state: String,
    lat: f64,
    lon: f64,
    non_white: f64,
    masked_non_white: String,
    extirpation: f64,
    masked_extirpation: String,
}

const HEADERS: [&str; 14] = [
    "ORG_NPI_NUM",
    "ZIP_CODE",
    "Claims",
    "Provider Organization Name (Legal Business Name)",
    "Provider First Line Business Practice Location Address",
    "Provider Business Mailing Address City Name",
    "Provider Business Mailing Address State Name",
    "Mapped_State_Name",
    "Final_Latitude",
    "Final_Longitude",
    "% non-white",
    "Masked Racial Diversity",
    "% treated with extirpation",
    "Masked Extirpation",
];

fn generate_rows(rng: &mut SimpleRng, per_state: usize) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut npi: u64 = 1_000_000_000;
    for (abbr, full, west, south, east, north) in STATES {
        for _ in 0..per_state {
            npi += 1 + rng.next_u64() % 97;
            let non_white = rng.range(0.02, 0.85);
            let extirpation = rng.range(0.0, 0.3);
            let city = rng.pick(&CITIES);
            rows.push(Row {
                npi: npi.to_string(),
                zip: format!("{:05}", rng.next_u64() % 99_999),
                claims: (rng.range(0.0, 1.0).powi(2) * 600.0).round(),
                name: format!("{city} {}", rng.pick(&KINDS)),
                address: format!("{} {}", 1 + rng.next_u64() % 9_000, rng.pick(&STREETS)),
                city: city.to_string(),
                state: abbr.to_string(),
                mapped_state: full.to_string(),
                lat: rng.range(south + 0.3, north - 0.3),
                lon: rng.range(west + 0.3, east - 0.3),
                non_white,
                masked_non_white: mask_percentage(non_white),
                extirpation,
                masked_extirpation: mask_percentage(extirpation),
            });
        }
    }
    rows
}

fn write_csv(path: &str, rows: &[Row]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADERS)?;
    for r in rows {
        writer.write_record([
            r.npi.clone(),
            r.zip.clone(),
            r.claims.to_string(),
            r.name.clone(),
            r.address.clone(),
            r.city.clone(),
            r.state.clone(),
            r.mapped_state.clone(),
            format!("{:.6}", r.lat),
            format!("{:.6}", r.lon),
            format!("{:.4}", r.non_white),
            r.masked_non_white.clone(),
            format!("{:.4}", r.extirpation),
            r.masked_extirpation.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &str, rows: &[Row]) -> anyhow::Result<()> {
    let text = |f: fn(&Row) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let float = |f: fn(&Row) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };

    let schema = Arc::new(Schema::new(
        HEADERS
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let dtype = match i {
                    2 | 8 | 9 | 10 | 12 => DataType::Float64,
                    _ => DataType::Utf8,
                };
                Field::new(*name, dtype, false)
            })
            .collect::<Vec<_>>(),
    ));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            text(|r| r.npi.as_str()),
            text(|r| r.zip.as_str()),
            float(|r| r.claims),
            text(|r| r.name.as_str()),
            text(|r| r.address.as_str()),
            text(|r| r.city.as_str()),
            text(|r| r.state.as_str()),
            text(|r| r.mapped_state.as_str()),
            float(|r| r.lat),
            float(|r| r.lon),
            float(|r| r.non_white),
            text(|r| r.masked_non_white.as_str()),
            float(|r| r.extirpation),
            text(|r| r.masked_extirpation.as_str()),
        ],
    )?;

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_boundaries(path: &str) -> anyhow::Result<()> {
    let features: Vec<_> = STATES
        .iter()
        .map(|(_, full, w, s, e, n)| {
            json!({
                "type": "Feature",
                "properties": { "name": full },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[w, s], [e, s], [e, n], [w, n], [w, s]]],
                },
            })
        })
        .collect();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    std::fs::write(path, serde_json::to_string_pretty(&collection)?)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = generate_rows(&mut rng, 25);

    write_csv("Sample_Data_RMap_07022023.csv", &rows)?;
    write_parquet("Sample_Data_RMap_07022023.parquet", &rows)?;
    write_boundaries("us-state-boundaries.geojson")?;

    println!(
        "Wrote {} provider records across {} states (CSV, Parquet) and their boundaries",
        rows.len(),
        STATES.len()
    );
    Ok(())
}
