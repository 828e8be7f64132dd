//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info};
use vnlab_api_models::{
    ActionResponse, BuildResponse, DeploymentSummary, HealthResponse, HostDetails,
    HostInterfaces, InterfaceAddresses, NetworkSummary, VersionResponse,
};

use crate::app::state::AppState;
use crate::errors::LabError;
use crate::models::kind::ResourceKind;
use crate::models::state::InterfaceMap;
use crate::models::template::Template;
use crate::orchestrator::inspect::{DeploymentView, HostView, NetworkView};
use crate::orchestrator::{Target, Verb};
use crate::utils::version_info;

/// A [`LabError`] rendered as an `ActionResponse` with a matching status
#[derive(Debug)]
pub struct ApiError(pub LabError);

impl From<LabError> for ApiError {
    fn from(err: LabError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(ActionResponse::failed(self.0.to_string()))).into_response()
    }
}

pub fn status_for(err: &LabError) -> StatusCode {
    match err.root() {
        LabError::Validation(_) => StatusCode::BAD_REQUEST,
        LabError::NotFound { .. } => StatusCode::NOT_FOUND,
        LabError::NameConflict { .. } | LabError::AddressConflict { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "vnlab".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Build a deployment from a JSON or YAML template body
pub async fn build_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BuildResponse>, ApiError> {
    let template = Template::from_slice(&body)
        .map_err(|e| LabError::Validation(format!("invalid template: {}", e)))?;
    let deployment = state.build(&template).await?;
    info!("Built deployment {} over REST", deployment.name());

    Ok(Json(BuildResponse {
        success: true,
        deployment: deployment.record.name,
        hosts: deployment.hosts.into_iter().map(|h| h.name).collect(),
        networks: deployment.networks.into_iter().map(|n| n.name).collect(),
    }))
}

async fn action(
    state: &AppState,
    verb: Verb,
    resource: &str,
    name: String,
) -> Result<Json<ActionResponse>, ApiError> {
    let kind: ResourceKind = resource.parse()?;
    let target = Target::new(kind, name);
    let report = state.apply(verb, &target).await?;
    Ok(Json(ActionResponse::ok(report.summary(verb, &target))))
}

pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path((resource, name)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    action(&state, Verb::Start, &resource, name).await
}

pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path((resource, name)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    action(&state, Verb::Stop, &resource, name).await
}

pub async fn restart_handler(
    State(state): State<Arc<AppState>>,
    Path((resource, name)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    action(&state, Verb::Restart, &resource, name).await
}

pub async fn destroy_handler(
    State(state): State<Arc<AppState>>,
    Path((resource, name)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    action(&state, Verb::Destroy, &resource, name).await
}

pub async fn hosts_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HostDetails>>, ApiError> {
    let hosts = state.inspector().all_host_details().await?;
    Ok(Json(hosts.into_iter().map(HostDetails::from).collect()))
}

pub async fn networks_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NetworkSummary>>, ApiError> {
    let networks = state.inspector().networks().await?;
    Ok(Json(networks.into_iter().map(NetworkSummary::from).collect()))
}

pub async fn deployments_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeploymentSummary>>, ApiError> {
    let deployments = state.inspector().deployments().await?;
    Ok(Json(
        deployments
            .into_iter()
            .map(DeploymentSummary::from)
            .collect(),
    ))
}

pub async fn details_handler(
    State(state): State<Arc<AppState>>,
    Path(host): Path<String>,
) -> Result<Json<HostDetails>, ApiError> {
    let view = state.inspector().host_details(&host).await?;
    Ok(Json(HostDetails::from(view)))
}

pub async fn ipv4_handler(
    State(state): State<Arc<AppState>>,
    Path(host): Path<String>,
) -> Result<Json<HostInterfaces>, ApiError> {
    let interfaces = state.inspector().host_ipv4(&host).await?;
    Ok(Json(to_wire(interfaces)))
}

// ================================ CONVERSIONS =================================== //

impl From<HostView> for HostDetails {
    fn from(view: HostView) -> Self {
        HostDetails {
            name: view.record.name,
            image: view.record.image,
            state: view.state.to_string(),
            ram: view.record.ram,
            cpus: view.record.cpus,
            username: view.record.username,
            password: view.record.password,
            hd_space: view.record.hd_space,
            deployment: view.deployment,
        }
    }
}

impl From<NetworkView> for NetworkSummary {
    fn from(view: NetworkView) -> Self {
        NetworkSummary {
            name: view.record.name,
            net_type: view.record.net_type,
            ip: view.record.ip,
            netmask: view.record.netmask,
            dhcp_lower: view.record.dhcp_lower,
            dhcp_upper: view.record.dhcp_upper,
            deployment: view.deployment,
        }
    }
}

impl From<DeploymentView> for DeploymentSummary {
    fn from(view: DeploymentView) -> Self {
        DeploymentSummary {
            name: view.record.name,
            hosts: view.hosts,
            networks: view.networks,
            created_at: view.record.created_at,
        }
    }
}

fn to_wire(interfaces: InterfaceMap) -> HostInterfaces {
    interfaces
        .into_iter()
        .map(|(name, iface)| {
            (
                name,
                InterfaceAddresses {
                    mac: iface.mac,
                    addresses: iface.addresses,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_looks_through_context() {
        let conflict = LabError::name_conflict(ResourceKind::Host, "vm1")
            .context("host vm1")
            .context("failed to create hosts");
        assert_eq!(status_for(&conflict), StatusCode::CONFLICT);

        let missing = LabError::not_found(ResourceKind::Deployment, "lab9");
        assert_eq!(status_for(&missing), StatusCode::NOT_FOUND);

        assert_eq!(
            status_for(&LabError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&LabError::Backend("virsh died".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
