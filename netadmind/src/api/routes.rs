use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::protocol::API_PREFIX;
use shared::types::{
    ApiResponse, DhcpChange, DhcpConfig, DnsChange, Lease, LeaseHistoryPoint, RecordType, Stats,
    Subnet, ZoneListing,
};
use crate::apply::{ApplyEngine, ApplySummary};
use crate::changelog::{Accepted, ChangeLog, PendingSnapshot, Preview};
use crate::config::Config;
use crate::error::{ApplyError, ValidationError};
use crate::liveness::LivenessCache;
use crate::privileged::{Credential, SudoRunner};
use crate::reader;
use crate::services::{self, ServiceAction, ServiceStatus};
use crate::validate;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub log: Arc<ChangeLog>,
    pub liveness: LivenessCache,
    pub engine: Arc<ApplyEngine<SudoRunner>>,
}

type Rejection = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, Rejection>;

fn rejected(e: ValidationError) -> Rejection {
    tracing::debug!("Rejected request: {}", e);
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string())))
}

fn failed(status: StatusCode, e: ApplyError) -> Rejection {
    tracing::error!("Request failed: {}", e);
    (status, Json(ApiResponse::error(e.to_string())))
}

fn staged(accepted: Accepted) -> Json<ApiResponse<Accepted>> {
    Json(ApiResponse::ok("Staged for activation", accepted))
}

#[derive(Deserialize)]
pub struct HostRequest {
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub ip: Option<String>,
}

#[derive(Deserialize)]
pub struct HostUpdate {
    pub mac: Option<String>,
    pub ip: Option<String>,
}

#[derive(Deserialize)]
pub struct RecordRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub value: Option<String>,
    pub priority: Option<String>,
}

#[derive(Deserialize)]
pub struct ZoneRequest {
    pub name: Option<String>,
    pub soa_ns: Option<String>,
    pub soa_email: Option<String>,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    pub credential: Credential,
}

fn default_ttl() -> u32 {
    86400
}

/// Body of a privileged call that needs nothing but the credential
#[derive(Deserialize)]
pub struct CredentialRequest {
    pub credential: Credential,
}

#[derive(Serialize)]
pub struct LeasesResponse {
    pub leases: Vec<Lease>,
}

#[derive(Serialize)]
pub struct NetworksResponse {
    pub networks: Vec<Subnet>,
}

#[derive(Serialize)]
pub struct LeaseHistoryResponse {
    pub history: Vec<LeaseHistoryPoint>,
}

#[derive(Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceStatus>,
}

pub fn router(state: AppState) -> Router {
    let api: Router<AppState> = Router::new()
        .route("/dhcp", get(get_dhcp))
        .route("/dhcp/host", post(add_host))
        .route("/dhcp/host/:hostname", delete(delete_host).put(edit_host))
        .route("/dns", get(get_dns))
        .route("/dns/zone", post(create_zone))
        .route("/dns/zone/:zone/record", post(add_record).put(edit_record))
        .route("/dns/zone/:zone/record/:name/:rtype", delete(delete_record))
        .route("/networks", get(get_networks))
        .route("/leases", get(get_leases))
        .route("/lease/history", get(get_lease_history))
        .route("/stats", get(get_stats))
        .route("/services", get(get_services))
        .route("/services/:service/:action", post(control_service))
        .route("/changes", get(get_changes))
        .route("/changes/preview", get(preview_changes))
        .route("/changes/apply", post(apply_changes))
        .route("/changes/discard", post(discard_changes));

    Router::new().nest(API_PREFIX, api).with_state(state)
}

async fn get_dhcp(State(state): State<AppState>) -> Json<DhcpConfig> {
    let mut config = reader::dhcp::read_dhcp_config(&state.config.paths.dhcp_conf);
    state.liveness.annotate_hosts(&mut config.hosts);
    Json(config)
}

async fn get_dns(State(state): State<AppState>) -> Json<ZoneListing> {
    let mut listing = reader::dns::read_zones(&state.config.paths.bind_dir);
    state.liveness.annotate_zones(&mut listing.zones);
    Json(listing)
}

async fn get_leases(State(state): State<AppState>) -> Json<LeasesResponse> {
    let mut leases = reader::leases::read_leases(&state.config.paths.leases_file);
    state.liveness.annotate_leases(&mut leases);
    Json(LeasesResponse { leases })
}

async fn get_networks(State(state): State<AppState>) -> Json<NetworksResponse> {
    let config = reader::dhcp::read_dhcp_config(&state.config.paths.dhcp_conf);
    Json(NetworksResponse {
        networks: config.subnets,
    })
}

async fn get_lease_history(State(state): State<AppState>) -> Json<LeaseHistoryResponse> {
    let leases = reader::leases::read_leases(&state.config.paths.leases_file);
    Json(LeaseHistoryResponse {
        history: reader::leases::lease_history(&leases),
    })
}

async fn get_stats(State(state): State<AppState>) -> Json<Stats> {
    let paths = &state.config.paths;
    let dhcp = reader::dhcp::read_dhcp_config(&paths.dhcp_conf);
    let listing = reader::dns::read_zones(&paths.bind_dir);
    let leases = reader::leases::read_leases(&paths.leases_file);

    Json(Stats {
        static_hosts: dhcp.hosts.len(),
        active_leases: leases
            .iter()
            .filter(|l| l.state.as_deref() == Some("active"))
            .count(),
        dns_zones: listing.zones.len(),
        dns_records: listing.zones.iter().map(|z| z.record_count).sum(),
        online_hosts: state.liveness.online_count(),
        pending_changes: state.log.dhcp_len() + state.log.dns_len(),
    })
}

async fn get_services(State(state): State<AppState>) -> Json<ServicesResponse> {
    Json(ServicesResponse {
        services: services::statuses(&state.config.services).await,
    })
}

async fn control_service(
    State(state): State<AppState>,
    Path((service, action)): Path<(String, String)>,
    Json(req): Json<CredentialRequest>,
) -> ApiResult<String> {
    let service = services::resolve(&state.config.services, &service).map_err(rejected)?;
    let action: ServiceAction = action.parse().map_err(rejected)?;

    let output = state
        .engine
        .control_service(service, action, &req.credential)
        .await
        .map_err(|e| failed(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(Json(ApiResponse::ok(format!("Service {} {} done", service, action), output)))
}

async fn add_host(
    State(state): State<AppState>,
    Json(req): Json<HostRequest>,
) -> ApiResult<Accepted> {
    let hostname = validate::required(req.hostname.as_deref()).map_err(rejected)?;
    let mac = validate::required(req.mac.as_deref()).map_err(rejected)?;
    let ip = validate::required(req.ip.as_deref()).map_err(rejected)?;

    let hostname = validate::validate_hostname(hostname).map_err(rejected)?;
    let mac = validate::normalize_mac(mac).map_err(rejected)?;
    let ip = validate::validate_ipv4(ip).map_err(rejected)?;

    Ok(staged(state.log.stage(DhcpChange::add(hostname, mac, ip))))
}

async fn edit_host(
    State(state): State<AppState>,
    Path(hostname): Path<String>,
    Json(req): Json<HostUpdate>,
) -> ApiResult<Accepted> {
    let hostname = validate::validate_hostname(&hostname).map_err(rejected)?;
    let mac = blank_to_none(req.mac)
        .map(|m| validate::normalize_mac(&m))
        .transpose()
        .map_err(rejected)?;
    let ip = blank_to_none(req.ip)
        .map(|ip| validate::validate_ipv4(&ip))
        .transpose()
        .map_err(rejected)?;

    Ok(staged(state.log.stage(DhcpChange::edit(hostname, mac, ip))))
}

async fn delete_host(
    State(state): State<AppState>,
    Path(hostname): Path<String>,
) -> ApiResult<Accepted> {
    let hostname = validate::validate_hostname(&hostname).map_err(rejected)?;
    Ok(staged(state.log.stage(DhcpChange::delete(hostname))))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validated add/edit record request. MX records must carry a preference;
/// other types drop any priority given.
fn record_change(zone: &str, req: RecordRequest, edit: bool) -> Result<DnsChange, ValidationError> {
    let zone = validate::validate_zone_name(zone)?;
    let name = validate::required(req.name.as_deref())?;
    let record_type = validate::required(req.record_type.as_deref())?;
    let value = validate::required(req.value.as_deref())?;

    let name = validate::validate_record_name(name)?;
    let record_type = validate::parse_record_type(record_type)?;
    let value = validate::validate_record_value(record_type, value)?;

    let change = if edit {
        DnsChange::edit(zone, name, record_type, value)
    } else {
        DnsChange::add(zone, name, record_type, value)
    };
    if record_type != RecordType::Mx {
        return Ok(change);
    }
    let priority = validate::required(req.priority.as_deref())?;
    Ok(change.with_priority(validate::validate_priority(priority)?))
}

async fn add_record(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Json(req): Json<RecordRequest>,
) -> ApiResult<Accepted> {
    let change = record_change(&zone, req, false).map_err(rejected)?;
    Ok(staged(state.log.stage(change)))
}

async fn edit_record(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Json(req): Json<RecordRequest>,
) -> ApiResult<Accepted> {
    let change = record_change(&zone, req, true).map_err(rejected)?;
    Ok(staged(state.log.stage(change)))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((zone, name, rtype)): Path<(String, String, String)>,
) -> ApiResult<Accepted> {
    let zone = validate::validate_zone_name(&zone).map_err(rejected)?;
    let name = validate::validate_record_name(&name).map_err(rejected)?;
    let record_type = validate::parse_record_type(&rtype).map_err(rejected)?;
    Ok(staged(state.log.stage(DnsChange::delete(zone, name, record_type))))
}

async fn create_zone(
    State(state): State<AppState>,
    Json(req): Json<ZoneRequest>,
) -> ApiResult<String> {
    let name = validate::required(req.name.as_deref()).map_err(rejected)?;
    let soa_ns = validate::required(req.soa_ns.as_deref()).map_err(rejected)?;
    let soa_email = validate::required(req.soa_email.as_deref()).map_err(rejected)?;
    let name = validate::validate_zone_name(name).map_err(rejected)?;
    let soa_ns = validate::validate_record_name(soa_ns).map_err(rejected)?;
    let soa_email = validate::validate_record_name(soa_email).map_err(rejected)?;

    let path = state
        .engine
        .create_zone(&name, &soa_ns, &soa_email, req.ttl, &req.credential)
        .await
        .map_err(|e| match e {
            ApplyError::ZoneExists { .. } => failed(StatusCode::CONFLICT, e),
            e => failed(StatusCode::INTERNAL_SERVER_ERROR, e),
        })?;

    Ok(Json(ApiResponse::ok("Zone created", path.display().to_string())))
}

async fn get_changes(State(state): State<AppState>) -> Json<PendingSnapshot> {
    Json(state.log.snapshot())
}

async fn preview_changes(State(state): State<AppState>) -> Json<Preview> {
    Json(state.log.preview())
}

/// Any unit that did not commit turns the envelope into an error. The
/// summary is returned either way.
async fn apply_changes(
    State(state): State<AppState>,
    Json(req): Json<CredentialRequest>,
) -> (StatusCode, Json<ApiResponse<ApplySummary>>) {
    let summary = state.engine.apply_all(&req.credential).await;
    match summary.failure_message() {
        None => (StatusCode::OK, Json(ApiResponse::ok("Changes applied", summary))),
        Some(message) => {
            tracing::error!("{}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error_with(message, summary)),
            )
        }
    }
}

async fn discard_changes(State(state): State<AppState>) -> Json<ApiResponse<usize>> {
    let count = state.log.discard();
    Json(ApiResponse::ok("Changes discarded", count))
}
