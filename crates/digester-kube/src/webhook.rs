//! Mutating admission webhook
//!
//! Serves `POST /v1/mutate` over HTTPS. Every request is decided by
//! [`Digester::review`]; health probes live on a separate plain HTTP
//! listener so they keep working without client certificates.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use kube::api::DynamicObject;
use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, Operation as KubeOperation,
};

use digester_core::{AdmissionInput, AdmissionOutcome, Digester, Operation};

use crate::error::{KubeError, Result};

/// Path the webhook configuration points at
pub const MUTATE_PATH: &str = "/v1/mutate";

/// Certificate file name inside the cert directory
pub const CERT_FILE: &str = "tls.crt";

/// Private key file name inside the cert directory
pub const KEY_FILE: &str = "tls.key";

/// Webhook listener settings
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// HTTPS address for admission requests
    pub addr: SocketAddr,
    /// Plain HTTP address for `/healthz` and `/readyz`
    pub health_addr: SocketAddr,
    /// Directory holding `tls.crt` and `tls.key`
    pub cert_dir: PathBuf,
}

impl WebhookConfig {
    pub fn cert_path(&self) -> PathBuf {
        self.cert_dir.join(CERT_FILE)
    }

    pub fn key_path(&self) -> PathBuf {
        self.cert_dir.join(KEY_FILE)
    }
}

/// Router for admission requests
pub fn router(digester: Arc<Digester>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_handler))
        .with_state(digester)
}

/// Router for liveness and readiness probes
pub fn health_router() -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
}

/// Handle a mutating admission review
pub async fn mutate_handler(
    State(digester): State<Arc<Digester>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = review(&digester, &req).await;
    Json(response.into_review())
}

async fn review(digester: &Digester, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let uid = req.uid.clone();
    let input = match to_input(req) {
        Ok(input) => input,
        Err(e) => {
            tracing::error!(uid = %uid, error = %e, "failed to serialize admission object");
            return AdmissionResponse::from(req).deny(e.to_string());
        }
    };

    let outcome = digester.review(&input).await;
    tracing::info!(
        uid = %uid,
        allowed = outcome.is_allowed(),
        reason = outcome.reason().map(|r| r.as_str()).unwrap_or_default(),
        operations = outcome.operations().len(),
        "admission decision"
    );
    to_response(req, outcome)
}

/// Convert a Kubernetes admission request into engine input
pub fn to_input(req: &AdmissionRequest<DynamicObject>) -> serde_json::Result<AdmissionInput> {
    let operation = match req.operation {
        KubeOperation::Create => Operation::Create,
        KubeOperation::Update => Operation::Update,
        KubeOperation::Delete => Operation::Delete,
        KubeOperation::Connect => Operation::Connect,
    };
    let raw_object = match &req.object {
        Some(object) => serde_json::to_vec(object)?,
        None => Vec::new(),
    };

    let mut input = AdmissionInput::new(
        operation,
        req.namespace.clone().unwrap_or_default(),
        raw_object,
    )
    .with_kind(req.kind.kind.clone());
    if !req.name.is_empty() {
        input = input.with_name(req.name.clone());
    }
    Ok(input)
}

/// Map an engine decision onto an admission response
///
/// Allowed decisions carry their reason; denials carry the error message
/// with code 500.
pub fn to_response(req: &AdmissionRequest<DynamicObject>, outcome: AdmissionOutcome) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(req);
    match outcome {
        AdmissionOutcome::AllowedUnchanged { reason } => {
            response.result.code = 200;
            response.result.reason = reason.to_string();
            response
        }
        AdmissionOutcome::AllowedWithPatch { reason, operations } => {
            response.result.code = 200;
            response.result.reason = reason.to_string();
            match response.with_patch(json_patch::Patch(operations)) {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(uid = %req.uid, error = %e, "failed to serialize patch");
                    let mut denied =
                        AdmissionResponse::from(req).deny(format!("patch serialization error: {e}"));
                    denied.result.code = 500;
                    denied
                }
            }
        }
        AdmissionOutcome::Denied { error } => {
            let mut denied = response.deny(error.to_string());
            denied.result.code = 500;
            denied
        }
    }
}

/// Serve the webhook until either listener fails
pub async fn serve(config: WebhookConfig, digester: Arc<Digester>) -> Result<()> {
    let tls = load_tls(&config.cert_path(), &config.key_path()).await?;
    let WebhookConfig {
        addr, health_addr, ..
    } = config;

    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| KubeError::Server(format!("failed to bind {}: {}", health_addr, e)))?;
    tracing::info!(addr = %health_addr, "starting health server");
    let health = async move {
        axum::serve(health_listener, health_router())
            .await
            .map_err(|e| KubeError::Server(format!("health server: {}", e)))
    };

    tracing::info!(addr = %addr, path = MUTATE_PATH, "starting webhook server");
    let webhook = async move {
        axum_server::bind_rustls(addr, tls)
            .serve(router(digester).into_make_service())
            .await
            .map_err(|e| KubeError::Server(format!("webhook server: {}", e)))
    };

    tokio::try_join!(health, webhook)?;
    Ok(())
}

async fn load_tls(cert: &Path, key: &Path) -> Result<RustlsConfig> {
    RustlsConfig::from_pem_file(cert, key).await.map_err(|e| {
        KubeError::Tls(format!(
            "failed to load {} and {}: {}",
            cert.display(),
            key.display(),
            e
        ))
    })
}
