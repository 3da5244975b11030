//! Site directory: list/create sites and list a site's materials
//!
//! Thin reads and writes against the persistence gateway. The only real-time hook is
//! `create_site`, which announces the new site to every live connection.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sitesync_common::{Identity, MaterialRecord, Site};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/sites
pub async fn list_sites(State(state): State<AppState>) -> ApiResult<Json<Vec<Site>>> {
    Ok(Json(state.gateway.list_sites().await?))
}

/// Body of POST /api/create_site
#[derive(Debug, Default, Deserialize)]
pub struct CreateSiteRequest {
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub site_location: Option<String>,
}

/// POST /api/create_site
///
/// Admin only. Broadcasts `site_created` to all connections after the commit.
pub async fn create_site(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateSiteRequest>,
) -> ApiResult<Json<Value>> {
    if !identity.is_admin() {
        warn!(username = %identity.username, "Site creation refused: not admin");
        return Err(ApiError::Forbidden("Only admins may create sites".to_string()));
    }

    let (name, location) = match (req.site_name.as_deref(), req.site_location.as_deref()) {
        (Some(name), Some(location)) if !name.is_empty() && !location.is_empty() => {
            (name, location)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "site_name and site_location are required".to_string(),
            ))
        }
    };

    let site = state
        .gateway
        .insert_site(name, location, &identity.username)
        .await?;
    info!(site_id = %site.id, created_by = %site.created_by, "Site created");

    state.broadcaster.announce_site(site.clone()).await;

    Ok(Json(json!({ "success": true, "site": site })))
}

/// GET /api/get_materials/:site_id
pub async fn get_materials(
    State(state): State<AppState>,
    Path(site_id): Path<String>,
) -> ApiResult<Json<Vec<MaterialRecord>>> {
    Ok(Json(state.gateway.list_materials(&site_id).await?))
}
