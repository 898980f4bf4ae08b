use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, error, info, trace};

/// Connect to `database_url` and apply every pending migration.
pub async fn init_database(database_url: &str) -> Result<()> {
    let db = connect_and_migrate(database_url).await?;
    drop(db);

    info!("Database initialization completed successfully!");
    Ok(())
}

pub(crate) async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection> {
    trace!("Entering connect_and_migrate function");
    debug!("Database URL: {}", database_url);

    let db = match Database::connect(database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", database_url, e);
            return Err(e.into());
        }
    };

    let pending = Migrator::get_pending_migrations(&db).await?;
    if pending.is_empty() {
        info!("Schema is up to date, nothing to migrate");
        return Ok(db);
    }
    for migration in &pending {
        debug!("Pending migration: {}", migration.name());
    }

    info!("Applying {} database migrations", pending.len());
    match Migrator::up(&db, None).await {
        Ok(_) => info!("Database migrations completed successfully"),
        Err(e) => {
            error!("Failed to run database migrations: {}", e);
            return Err(e.into());
        }
    }

    Ok(db)
}
