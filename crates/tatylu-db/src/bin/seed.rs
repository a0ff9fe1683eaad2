//! # Seed Data Generator
//!
//! Populates the database with a sample catalog and a demo user for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p tatylu-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tatylu-db --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p tatylu-db --bin seed -- --db ./data/tatylu.db
//! ```
//!
//! ## Generated Products
//! Products across the storefront categories (ropa, calzado, accesorios,
//! hogar, belleza), each with:
//! - Numeric alternate code: `{category}{index:03}` (e.g. `1004`)
//! - Price: $4.99 - $49.99
//! - Discount: 0%, 5%, 10% or 25%
//! - Stock: 0 - 40

use std::env;
use tatylu_db::repository::product::NewProduct;
use tatylu_db::repository::user::NewUser;
use tatylu_db::{Database, DbConfig};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "ropa",
        &[
            "Camiseta básica",
            "Camisa de lino",
            "Pantalón jean",
            "Chompa de lana",
            "Vestido floral",
            "Falda plisada",
            "Chaqueta impermeable",
            "Short deportivo",
        ],
    ),
    (
        "calzado",
        &[
            "Zapatillas urbanas",
            "Botas de cuero",
            "Sandalias",
            "Mocasines",
            "Zapatos de vestir",
            "Pantuflas",
        ],
    ),
    (
        "accesorios",
        &[
            "Gorra bordada",
            "Bufanda tejida",
            "Cinturón de cuero",
            "Bolso de mano",
            "Mochila",
            "Gafas de sol",
            "Reloj",
        ],
    ),
    (
        "hogar",
        &[
            "Taza de cerámica",
            "Cojín decorativo",
            "Manta polar",
            "Vela aromática",
            "Juego de toallas",
        ],
    ),
    (
        "belleza",
        &[
            "Crema hidratante",
            "Protector solar",
            "Shampoo natural",
            "Perfume floral",
            "Labial mate",
        ],
    ),
];

/// Size variants with a price add-on in cents
const SIZES: &[(&str, i64)] = &[("S", 0), ("M", 0), ("L", 150), ("XL", 300)];

/// Catalog discounts in percent
const DISCOUNTS: &[f64] = &[0.0, 0.0, 5.0, 10.0, 0.0, 25.0];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./tatylu_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tatylu Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./tatylu_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tatylu Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

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
    let start = std::time::Instant::now();

    'outer: for (category_idx, (category, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = name_idx * SIZES.len() + size_idx;
                let product = generate_product(category, name, size, *price_addon, category_idx + 1, seed);
                let code = product.code.clone().unwrap_or_default();

                if let Err(e) = db.products().insert(product).await {
                    eprintln!("Failed to insert {}: {}", code, e);
                    continue;
                }

                generated += 1;

                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    match db.users().get_by_email("demo@tatylu.local").await? {
        Some(user) => println!("✓ Demo user exists: {}", user.id),
        None => {
            let user = db
                .users()
                .insert(NewUser {
                    nombre: "Demo".into(),
                    apellido: "Tatylu".into(),
                    email: "demo@tatylu.local".into(),
                    telefono: "0999999999".into(),
                    cedula: "1700000000".into(),
                })
                .await?;
            println!("✓ Demo user created: {}", user.id);
        }
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    category_number: usize,
    seed: usize,
) -> NewProduct {
    // Numeric alternate code, like the storefront's legacy ids
    let code = format!("{}{:03}", category_number, seed);

    // Price: $4.99 - $49.99 + size addon
    let price_cents = 499 + ((seed * 37 + category_number * 11) % 4500) as i64 + price_addon;

    let discount_pct = DISCOUNTS[seed % DISCOUNTS.len()];
    let stock = ((seed * 7 + category_number) % 41) as i64;

    NewProduct {
        code: Some(code),
        name: format!("{} {}", name, size),
        price_cents,
        discount_pct,
        stock,
        category: category.to_string(),
    }
}
