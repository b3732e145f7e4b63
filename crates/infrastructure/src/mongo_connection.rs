use bson::doc;
use mongodb::{Client, Database};
use tracing::info;

use rolemend_core::{AppError, AppResult};

/// Shared MongoDB connection handle for the document-store adapters.
#[derive(Clone)]
pub struct MongoConnection {
    database: Database,
}

impl MongoConnection {
    /// Connects and verifies the deployment with a ping.
    ///
    /// Short server-selection timeouts keep an unreachable deployment from
    /// hanging startup.
    pub async fn connect(uri: &str, database_name: &str) -> AppResult<Self> {
        let timeout_uri = if uri.contains('?') {
            format!("{uri}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        } else {
            format!("{uri}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|error| {
            AppError::Connectivity(format!("failed to connect to MongoDB: {error}"))
        })?;

        let database = client.database(database_name);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|error| AppError::Connectivity(format!("MongoDB ping failed: {error}")))?;

        info!(database = database_name, "connected to MongoDB");
        Ok(Self { database })
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }
}
