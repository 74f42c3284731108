use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use std::time::Duration;
use tracing::{debug, info};

use crate::entities::{
    internal_transfer, material, notification, order, order_request, project, transaction_history,
};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, DbErr> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    Ok(db)
}

/// Creates every table the crate owns. Used for SQLite deployments and the
/// integration-test fixture; Postgres deployments run real migrations
/// instead.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(material::Entity),
        schema.create_table_from_entity(order_request::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(internal_transfer::Entity),
        schema.create_table_from_entity(notification::Entity),
        schema.create_table_from_entity(transaction_history::Entity),
        schema.create_table_from_entity(project::Entity),
    ];

    for statement in &mut statements {
        db.execute(backend.build(statement.if_not_exists())).await?;
    }

    Ok(())
}

/// In-memory SQLite connection with the full schema, for tests and local
/// experimentation. Pinned to a single connection: every pooled SQLite
/// `:memory:` connection would otherwise see its own empty database.
pub async fn connect_in_memory() -> Result<DbPool, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt).await?;
    create_schema(&db).await?;
    Ok(db)
}
