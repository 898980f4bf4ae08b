use anyhow::Result;
use tracing::{debug, info, trace};

use super::initdb::connect_and_migrate;
use super::serve::run_server;
use crate::config::{build_app_state, Settings};
use crate::router::create_router;

pub async fn migrate_and_serve(settings: Settings) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");

    let db = connect_and_migrate(&settings.database_url).await?;
    tokio::fs::create_dir_all(&settings.media_root).await?;
    debug!("Media root ready at {}", settings.media_root.display());

    let bind_address = settings.bind_address.clone();
    let app = create_router(build_app_state(db, settings));
    debug!("Router created successfully");

    run_server(app, &bind_address).await
}
