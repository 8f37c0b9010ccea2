//! # Seed Data Generator
//!
//! Populates the database with a starter catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by the settings (default ./grocer.db)
//! cargo run -p grocer-db --bin seed
//!
//! # Specify database path
//! cargo run -p grocer-db --bin seed -- --db ./data/grocer.db
//!
//! # More log output
//! RUST_LOG=grocer_db=debug cargo run -p grocer-db --bin seed
//! ```
//!
//! ## Generated Data
//! - Vegetables and fruits with per-kg prices, stock and thresholds
//! - Loyalty settings (5 completed orders earn 10%)
//! - Coupons `WELCOME10` and `FRESH20`, assigned to the demo customer

use chrono::{Duration, Utc};
use grocer_core::validation::validate_product;
use grocer_core::{Category, Coupon, LoyaltySettings, Money, Product, Quantity, Rate};
use grocer_db::{Database, Settings};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEMO_CUSTOMER: &str = "customer-demo";

/// (name, price per kg in cents, stock in kg, threshold in kg)
const VEGETABLES: &[(&str, i64, i64, i64)] = &[
    ("Tomato", 450, 120, 20),
    ("Potato", 300, 250, 40),
    ("Onion", 250, 200, 30),
    ("Carrot", 350, 90, 15),
    ("Cucumber", 400, 60, 10),
    ("Pepper", 900, 40, 8),
    ("Eggplant", 600, 35, 6),
    ("Zucchini", 550, 30, 6),
    ("Lettuce", 700, 20, 5),
    ("Spinach", 1200, 15, 4),
    ("Garlic", 2500, 10, 2),
    ("Broccoli", 1100, 18, 4),
];

const FRUITS: &[(&str, i64, i64, i64)] = &[
    ("Apple", 500, 150, 25),
    ("Banana", 650, 100, 20),
    ("Orange", 450, 120, 20),
    ("Lemon", 600, 50, 10),
    ("Pear", 700, 45, 8),
    ("Grape", 1400, 30, 6),
    ("Strawberry", 2200, 12, 3),
    ("Cherry", 3000, 10, 2),
    ("Watermelon", 200, 300, 50),
    ("Peach", 900, 25, 5),
    ("Apricot", 1000, 20, 4),
    ("Kiwi", 1300, 15, 3),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut settings = Settings::load()?;
    let mut db_path: PathBuf = settings.database.path.clone();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("GreenGrocer Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: from settings, ./grocer.db)");
                println!("  -h, --help         Show this help message");
                println!();
                println!("Environment:");
                println!("  GROCER_CONFIG      Settings file (TOML)");
                println!("  GROCER_DB_PATH     Database file path");
                println!("  RUST_LOG           Log filter (default: info)");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 GreenGrocer Seed Data Generator");
    println!("==================================");
    println!("Database: {}", db_path.display());
    println!();

    // Connect to database
    settings.database.path = db_path;
    let db = Database::new(settings.db_config()).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated = 0;
    let catalog = VEGETABLES
        .iter()
        .map(|entry| (Category::Vegetable, entry))
        .chain(FRUITS.iter().map(|entry| (Category::Fruit, entry)));

    for (category, &(name, cents, stock_kg, threshold_kg)) in catalog {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category,
            price_per_kg: Money::from_cents(cents),
            stock: Quantity::from_kilograms(stock_kg),
            threshold: Quantity::from_kilograms(threshold_kg),
        };

        if let Err(e) = validate_product(&product) {
            eprintln!("Skipping {}: {}", name, e);
            continue;
        }
        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", name, e);
            continue;
        }
        generated += 1;
    }
    println!("✓ Generated {} products", generated);

    db.customers()
        .save_loyalty_settings(&LoyaltySettings::default())
        .await?;
    println!("✓ Loyalty settings saved");

    let today = Utc::now().date_naive();
    let coupons = [
        Coupon {
            id: Uuid::new_v4().to_string(),
            code: "WELCOME10".to_string(),
            discount_percent: Rate::from_percent(10),
            min_order_value: Money::from_cents(1000),
            expiry_date: None,
            active: true,
            max_usage: 0,
            usage_count: 0,
        },
        Coupon {
            id: Uuid::new_v4().to_string(),
            code: "FRESH20".to_string(),
            discount_percent: Rate::from_percent(20),
            min_order_value: Money::from_cents(5000),
            expiry_date: Some(today + Duration::days(30)),
            active: true,
            max_usage: 100,
            usage_count: 0,
        },
    ];

    for coupon in &coupons {
        db.coupons().insert(coupon).await?;
        db.coupons().assign(DEMO_CUSTOMER, &coupon.id).await?;
        println!("✓ Coupon {} assigned to {}", coupon.code, DEMO_CUSTOMER);
    }

    println!();
    println!("Verifying catalog...");
    let search_results = db.products().search("an", 10).await?;
    println!("  Search 'an': {} results", search_results.len());
    let low_stock = db.products().list_low_stock().await?;
    println!("  Low stock: {} products", low_stock.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
