use log::{error, info, warn};
use mongodb::bson::doc;
use mongodb::{options::ClientOptions, Client, Database};

use crate::config::Config;

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    async fn try_init(uri: &str, db_name: &str) -> mongodb::error::Result<Self> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        // The driver connects lazily; ping so a bad URI fails here.
        db.run_command(doc! { "ping": 1 }).await?;
        Ok(MongoDB { client, db })
    }

    /// Connects to MongoDB, retrying a fixed number of times before giving up.
    pub async fn connect(config: &Config) -> mongodb::error::Result<Self> {
        let attempts = config.db_connect_retries.max(1);
        let mut attempt = 1;
        loop {
            match Self::try_init(&config.mongo_uri, &config.database_name).await {
                Ok(mongodb) => {
                    info!("MongoDB connected to database {}", config.database_name);
                    return Ok(mongodb);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "MongoDB connection attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, attempts, e, config.db_retry_delay
                    );
                    tokio::time::sleep(config.db_retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Failed to connect to MongoDB after {} attempts: {}", attempts, e);
                    return Err(e);
                }
            }
        }
    }
}
