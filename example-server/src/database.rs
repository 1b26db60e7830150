use axum_admin_table::Connection;
use axum_admin_table::database::DatabaseError;
use serde_json::{json, Value};

pub async fn setup(connection: &dyn Connection) -> Result<(), DatabaseError> {
    // Create roles table
    connection
        .exec(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            )
            "#,
            &[],
        )
        .await?;

    // Create users table referencing roles
    connection
        .exec(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                role_id INTEGER REFERENCES roles(id),
                tags TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                is_active BOOLEAN DEFAULT true
            )
            "#,
            &[],
        )
        .await?;

    // Create products table
    connection
        .exec(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                price REAL NOT NULL,
                stock INTEGER DEFAULT 0,
                category TEXT
            )
            "#,
            &[],
        )
        .await?;

    seed_sample_data(connection).await
}

async fn seed_sample_data(connection: &dyn Connection) -> Result<(), DatabaseError> {
    let rows = connection.query("SELECT count(*) AS total FROM users", &[]).await?;
    let seeded = rows
        .first()
        .and_then(|row| row.get("total"))
        .and_then(Value::as_i64)
        .unwrap_or_default();
    if seeded > 0 {
        return Ok(());
    }

    for role in ["admin", "editor", "viewer"] {
        connection
            .exec("INSERT INTO roles (name) VALUES (?)", &[json!(role)])
            .await?;
    }

    let first_names = [
        "Alice", "Bob", "Charlie", "Diana", "Evan", "Fiona", "George", "Hannah", "Isaac", "Julia",
    ];
    let last_names = ["Johnson", "Smith", "Brown", "Prince", "Davis", "Wilson", "Taylor"];
    let tags = ["staff", "staff,beta", "", "beta"];

    for index in 0..60 {
        let first = first_names[index % first_names.len()];
        let last = last_names[index % last_names.len()];
        let email = format!("{}.{}{}@example.com", first.to_lowercase(), last.to_lowercase(), index);
        connection
            .exec(
                "INSERT INTO users (name, email, role_id, tags, is_active) VALUES (?, ?, ?, ?, ?)",
                &[
                    json!(format!("{} {}", first, last)),
                    json!(email),
                    json!(index % 3 + 1),
                    json!(tags[index % tags.len()]),
                    json!(index % 5 != 0),
                ],
            )
            .await?;
    }

    let products = [
        ("Laptop", 999.99, 15, "Electronics"),
        ("Desk Lamp", 34.5, 120, "Home"),
        ("Notebook", 3.25, 800, "Office"),
        ("Headphones", 129.0, 42, "Electronics"),
        ("Chair", 189.0, 9, "Home"),
    ];
    for (name, price, stock, category) in products {
        connection
            .exec(
                "INSERT INTO products (name, price, stock, category) VALUES (?, ?, ?, ?)",
                &[json!(name), json!(price), json!(stock), json!(category)],
            )
            .await?;
    }

    Ok(())
}
