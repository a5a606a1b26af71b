pub mod auth;
pub mod dashboard;
pub mod forecast;
pub mod geocode;
pub mod health;
pub mod predictions;
pub mod training;
pub mod uploads;

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;

use crate::services::auth::AuthClient;
use crate::services::cache::ForecastCache;
use crate::services::nominatim::NominatimClient;
use crate::services::solcast::SolcastClient;

/// Shared application state, injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<ForecastCache>,
    pub solcast: SolcastClient,
    pub nominatim: NominatimClient,
    pub auth: AuthClient,
    pub media_root: PathBuf,
    pub models_dir: PathBuf,
}
