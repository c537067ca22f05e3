//! Writes a deterministic demo dataset for the dashboard.
//!
//! Usage: `generate_sample [OUTPUT]` (default `sample_data.csv`).

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};

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
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
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

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];

/// (product, base unit price)
const PRODUCTS: [(&str, f64); 5] = [
    ("Widget", 4.5),
    ("Gadget", 12.0),
    ("Doohickey", 7.25),
    ("Gizmo", 19.9),
    ("Thingamajig", 2.1),
];

const CHANNELS: [&str; 3] = ["online", "retail", "wholesale"];

const NOTES: [&str; 8] = [
    "fast delivery and great packaging",
    "product arrived damaged, asked for refund",
    "great value for the price",
    "delivery was late but support was helpful",
    "would order again",
    "packaging could be better",
    "excellent quality, fast shipping",
    "price too high compared to retail",
];

const ROWS: usize = 400;

fn main() -> Result<()> {
    env_logger::init();

    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_data.csv".to_string());
    let mut rng = SimpleRng::new(42);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).context("invalid start date")?;

    let mut writer = csv::Writer::from_path(&output_path)
        .with_context(|| format!("creating {output_path}"))?;
    writer.write_record([
        "order_id",
        "order_date",
        "region",
        "product",
        "sales_channel",
        "units",
        "unit_price",
        "revenue",
        "customer_rating",
        "returned",
        "customer_note",
    ])?;

    for order_id in 1..=ROWS {
        let date = start + Duration::days((rng.next_u64() % 366) as i64);
        let region = *rng.pick(&REGIONS);
        let (product, base_price) = *rng.pick(&PRODUCTS);
        let channel = *rng.pick(&CHANNELS);

        // Wholesale orders are larger and cheaper per unit.
        let (mean_units, discount) = if channel == "wholesale" { (40.0, 0.8) } else { (6.0, 1.0) };
        let units = rng.gauss(mean_units, mean_units / 3.0).round().max(1.0);
        let unit_price = (base_price * discount * rng.gauss(1.0, 0.05) * 100.0).round() / 100.0;
        let revenue = (units * unit_price * 100.0).round() / 100.0;

        // About 5% of ratings and 20% of notes are missing.
        let rating = if rng.chance(0.05) {
            String::new()
        } else {
            rng.gauss(3.8, 0.9).round().clamp(1.0, 5.0).to_string()
        };
        let note = if rng.chance(0.2) { "" } else { *rng.pick(&NOTES) };
        let returned = rng.chance(0.07);

        writer.write_record([
            order_id.to_string(),
            date.format("%Y-%m-%d").to_string(),
            region.to_string(),
            product.to_string(),
            channel.to_string(),
            units.to_string(),
            format!("{unit_price:.2}"),
            format!("{revenue:.2}"),
            rating,
            returned.to_string(),
            note.to_string(),
        ])?;
    }
    writer.flush().with_context(|| format!("writing {output_path}"))?;

    log::info!("Wrote {ROWS} orders to {output_path}");
    println!("Wrote {ROWS} orders to {output_path}");
    Ok(())
}
