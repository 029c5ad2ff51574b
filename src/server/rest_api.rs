use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::cache::{LazyCache, PlatformPush, PushOutcome, RefreshSelection};
use crate::error::{ScsError, StatusResponse};
use crate::validation::{validate_input, InputKind};

pub const ROLES_HEADER: &str = "X-Scs-Roles";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    HostDataUpdater,
    HostDataReader,
    CacheManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::HostDataUpdater => "HostDataUpdater",
            Role::HostDataReader => "HostDataReader",
            Role::CacheManager => "CacheManager",
        }
    }
}

/// Endpoint-level role check. Token validation itself happens in the
/// fronting authenticator; this seam only consumes its result.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, headers: &HeaderMap, role: Role) -> Result<(), ScsError>;
}

/// Reads the comma-separated role list the authenticating front end
/// injects into `X-Scs-Roles` after validating the caller's token.
pub struct HeaderRoleAuthorizer;

impl Authorizer for HeaderRoleAuthorizer {
    fn authorize(&self, headers: &HeaderMap, role: Role) -> Result<(), ScsError> {
        let granted = headers
            .get(ROLES_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if granted
            .split(',')
            .map(str::trim)
            .any(|granted_role| granted_role == role.as_str())
        {
            Ok(())
        } else {
            Err(ScsError::Unauthorized(role.as_str().to_string()))
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<LazyCache>,
    pub authorizer: Arc<dyn Authorizer>,
}

/// State for the role-checking middleware: the shared authorizer plus
/// the role the guarded route requires.
#[derive(Clone)]
struct RoleCtx {
    authorizer: Arc<dyn Authorizer>,
    role: Role,
}

impl RoleCtx {
    fn new(state: &AppState, role: Role) -> Self {
        Self {
            authorizer: state.authorizer.clone(),
            role,
        }
    }
}

async fn require_role(State(ctx): State<RoleCtx>, request: Request, next: Next) -> Response {
    if let Err(err) = ctx.authorizer.authorize(request.headers(), ctx.role) {
        return err.into_response();
    }
    next.run(request).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/platforms",
            post(push_platform).route_layer(middleware::from_fn_with_state(
                RoleCtx::new(&state, Role::HostDataUpdater),
                require_role,
            )),
        )
        .route(
            "/refreshes",
            get(refresh_collateral).route_layer(middleware::from_fn_with_state(
                RoleCtx::new(&state, Role::CacheManager),
                require_role,
            )),
        )
        .route(
            "/tcbstatus",
            get(get_tcb_status).route_layer(middleware::from_fn_with_state(
                RoleCtx::new(&state, Role::HostDataReader),
                require_role,
            )),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /platforms` request body. Unknown fields are rejected.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlatformInfo {
    #[serde(default)]
    enc_ppid: String,
    cpu_svn: String,
    pce_svn: String,
    pce_id: String,
    qe_id: String,
    #[serde(default)]
    manifest: String,
}

impl PlatformInfo {
    fn validate(&self) -> Result<(), ScsError> {
        let invalid = || ScsError::InvalidInput("invalid query param data".to_string());

        // The encrypted PPID is only optional when a manifest replaces it.
        if self.manifest.is_empty() || !self.enc_ppid.is_empty() {
            if !validate_input(InputKind::EncryptedPpid, &self.enc_ppid) {
                return Err(invalid());
            }
        }
        if !validate_input(InputKind::CpuSvn, &self.cpu_svn)
            || !validate_input(InputKind::PceSvn, &self.pce_svn)
            || !validate_input(InputKind::PceId, &self.pce_id)
            || !validate_input(InputKind::QeId, &self.qe_id)
        {
            return Err(invalid());
        }
        Ok(())
    }
}

async fn push_platform(
    State(state): State<AppState>,
    payload: Result<Json<PlatformInfo>, JsonRejection>,
) -> Result<Response, ScsError> {
    let Json(info) = payload.map_err(|err| ScsError::InvalidInput(err.to_string()))?;
    info.validate()?;

    let push = PlatformPush {
        enc_ppid: info.enc_ppid.to_lowercase(),
        cpu_svn: info.cpu_svn.to_lowercase(),
        pce_svn: info.pce_svn.to_lowercase(),
        pce_id: info.pce_id.to_lowercase(),
        qe_id: info.qe_id.to_lowercase(),
        manifest: info.manifest,
    };

    match state.cache.push_platform(push).await? {
        PushOutcome::AlreadyCached => Ok((
            StatusCode::OK,
            Json(StatusResponse::new("Success", "platform info already cached")),
        )
            .into_response()),
        PushOutcome::Created => {
            tracing::info!("platform data pushed");
            Ok((
                StatusCode::CREATED,
                Json(StatusResponse::new("Created", "platform data pushed to scs")),
            )
                .into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshParams {
    #[serde(rename = "type")]
    refresh_type: Option<String>,
}

async fn refresh_collateral(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
) -> Result<Response, ScsError> {
    let selection = match params.refresh_type.as_deref() {
        None => None,
        Some(value) if validate_input(InputKind::RefreshType, value) => {
            if value == "certs" {
                Some(RefreshSelection::Certs)
            } else {
                Some(RefreshSelection::Tcbs)
            }
        }
        Some(_) => {
            return Err(ScsError::InvalidInput("invalid query param data".to_string()));
        }
    };

    match state.cache.refresh(selection).await {
        Ok(()) => {
            tracing::info!("platform collateral refreshed");
            Ok((
                StatusCode::OK,
                Json(StatusResponse::new(
                    "Success",
                    "sgx collaterals refreshed successfully",
                )),
            )
                .into_response())
        }
        Err(ScsError::NotFound(reason)) => {
            tracing::warn!(%reason, "refresh walk found nothing to refresh");
            Ok((
                StatusCode::NOT_FOUND,
                Json(StatusResponse::new(
                    "Failure",
                    "could not find platform info in database",
                )),
            )
                .into_response())
        }
        Err(err) => Err(err),
    }
}

#[derive(Debug, Deserialize)]
struct TcbStatusParams {
    qeid: Option<String>,
}

async fn get_tcb_status(
    State(state): State<AppState>,
    Query(params): Query<TcbStatusParams>,
) -> Result<Response, ScsError> {
    let qe_id = params
        .qeid
        .ok_or_else(|| ScsError::InvalidInput("query data not provided".to_string()))?;
    if !validate_input(InputKind::QeId, &qe_id) {
        return Err(ScsError::InvalidInput("invalid qeid".to_string()));
    }

    let report = state.cache.tcb_status(&qe_id.to_lowercase()).await?;
    let status = if report.up_to_date { "true" } else { "false" };
    Ok((
        StatusCode::OK,
        Json(StatusResponse::new(status, report.message)),
    )
        .into_response())
}
