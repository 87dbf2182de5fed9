use axum::Json;
use recond_core::catalog;
use recond_model::ModuleInfo;

/// `GET /api/modules`: the selectable recon module catalog.
pub async fn list_modules() -> Json<Vec<ModuleInfo>> {
    Json(catalog::modules())
}
