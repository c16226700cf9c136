use glob::glob;
use tokio_postgres::NoTls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let admin_conn = std::env::var("PG_ADMIN_CONN").unwrap_or_else(|_| {
        "host=127.0.0.1 user=postgres password=postgres dbname=postgres".into()
    });
    let db_name = std::env::var("DB_NAME").unwrap_or_else(|_| "localhub_directory".into());

    println!("Connecting to Postgres to manage databases...");

    let (client, connection) = tokio_postgres::connect(&admin_conn, NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });

    let row = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])
        .await?;

    if row.is_some() {
        println!("Database '{}' already exists.", db_name);
    } else {
        let valid_name = db_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid_name {
            eprintln!(
                "Refusing to create database: invalid database name '{}'.",
                db_name
            );
            return Ok(());
        }

        let create_sql = format!("CREATE DATABASE \"{}\"", db_name);
        match client.execute(create_sql.as_str(), &[]).await {
            Ok(_) => println!("Database '{}' created successfully.", db_name),
            Err(e) => {
                eprintln!("Failed to create database '{}': {}", db_name, e);
                return Ok(());
            }
        }
    }

    // Apply the SQL files under migrations/ against the target database.
    let target_conn = std::env::var("PG_CONN").unwrap_or_else(|_| {
        format!(
            "host=127.0.0.1 user=postgres password=postgres dbname={}",
            db_name
        )
    });

    let (client, connection) = tokio_postgres::connect(&target_conn, NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });

    for entry in glob("migrations/*.sql")? {
        let path = entry?;
        let sql = std::fs::read_to_string(&path)?;
        client.batch_execute(&sql).await?;
        println!("Applied {}", path.display());
    }

    Ok(())
}
