use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::config::Configuration;
use crate::error::ScsError;

pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
pub const PCK_CERT_ISSUER_CHAIN_HEADER: &str = "Sgx-Pck-Certificate-Issuer-Chain";
pub const FMSPC_HEADER: &str = "Sgx-Fmspc";
pub const PCK_CERT_CA_TYPE_HEADER: &str = "Sgx-Pck-Certificate-Ca-Type";
pub const PCK_CRL_ISSUER_CHAIN_HEADER: &str = "Sgx-Pck-Crl-Issuer-Chain";
pub const TCB_INFO_ISSUER_CHAIN_HEADER: &str = "Sgx-Tcb-Info-Issuer-Chain";
pub const ENCLAVE_IDENTITY_ISSUER_CHAIN_HEADER: &str = "Sgx-Enclave-Identity-Issuer-Chain";

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);
const CRL_ENCODING: &str = "der";

/// One element of the `/pckcerts` response array. The accompanying `tcb`
/// object is not consumed; selection reads the TCB out of the
/// certificate itself.
#[derive(Clone, Debug, Deserialize)]
pub struct PckCertEntry {
    pub tcbm: String,
    pub cert: String,
}

#[derive(Clone, Debug)]
pub struct PckCertsReply {
    pub entries: Vec<PckCertEntry>,
    pub issuer_chain: String,
    pub fmspc: String,
    pub ca_type: String,
}

#[derive(Clone, Debug)]
pub struct PckCrlReply {
    pub crl: Vec<u8>,
    pub issuer_chain: String,
}

#[derive(Clone, Debug)]
pub struct TcbInfoReply {
    pub tcb_info: String,
    pub issuer_chain: String,
}

#[derive(Clone, Debug)]
pub struct QeIdentityReply {
    pub qe_info: String,
    pub issuer_chain: String,
}

/// Platform identity for the `/pckcerts` query. The platform manifest
/// takes precedence when both it and the encrypted PPID are present.
#[derive(Clone, Debug, Default)]
pub struct PckCertsQuery {
    pub enc_ppid: String,
    pub manifest: String,
    pub pce_id: String,
}

impl PckCertsQuery {
    /// The identity query parameter to send, or an error when neither
    /// identity is available.
    pub fn identity_param(&self) -> Result<(&'static str, &str), ScsError> {
        if !self.manifest.is_empty() {
            Ok(("platform_manifest", &self.manifest))
        } else if !self.enc_ppid.is_empty() {
            Ok(("encrypted_ppid", &self.enc_ppid))
        } else {
            Err(ScsError::InvalidInput(
                "invalid request, enc_ppid and platform_manifest are null".to_string(),
            ))
        }
    }
}

/// Outbound interface to the provisioning certification service. The
/// lazy-cache engine only sees this trait; tests script it.
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    async fn get_pck_certs(&self, query: &PckCertsQuery) -> Result<PckCertsReply, ScsError>;
    async fn get_pck_crl(&self, ca: &str) -> Result<PckCrlReply, ScsError>;
    async fn get_tcb_info(&self, fmspc: &str) -> Result<TcbInfoReply, ScsError>;
    async fn get_qe_identity(&self) -> Result<QeIdentityReply, ScsError>;
}

/// PCS client over HTTP. Each request carries a 5 second timeout;
/// transport-level failures are retried on a fixed backoff, HTTP error
/// statuses are surfaced immediately.
pub struct PcsClient {
    http: reqwest::Client,
    base_url: String,
    api_subscription_key: String,
    retry_count: u32,
    wait_time: Duration,
}

impl PcsClient {
    pub fn new(config: &Configuration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.prov_server_url.clone(),
            api_subscription_key: config.api_subscription_key.clone(),
            retry_count: config.retry_count.max(1),
            wait_time: config.wait_time,
        })
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<(Vec<u8>, HeaderMap), ScsError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        let response = loop {
            let mut request = self.http.get(&url).query(query);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            match request.send().await {
                Ok(response) => break response,
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.retry_count {
                        return Err(ScsError::UpstreamTimeout(format!(
                            "{url} failed after {attempt} attempts: {err}"
                        )));
                    }
                    tokio::time::sleep(self.wait_time).await;
                }
            }
        };

        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| ScsError::UpstreamTimeout(err.to_string()))?;
        if status != reqwest::StatusCode::OK {
            return Err(ScsError::UpstreamError {
                status: status.as_u16(),
                dump: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        if body.is_empty() {
            return Err(ScsError::UpstreamError {
                status: status.as_u16(),
                dump: format!("no content found in {path} response"),
            });
        }
        Ok((body.to_vec(), response_headers))
    }
}

#[async_trait]
impl ProvisioningClient for PcsClient {
    async fn get_pck_certs(&self, query: &PckCertsQuery) -> Result<PckCertsReply, ScsError> {
        let (identity_key, identity_value) = query.identity_param()?;
        let (body, headers) = self
            .get(
                "/pckcerts",
                &[(identity_key, identity_value), ("pceid", &query.pce_id)],
                &[(SUBSCRIPTION_KEY_HEADER, &self.api_subscription_key)],
            )
            .await?;
        let entries: Vec<PckCertEntry> = serde_json::from_slice(&body).map_err(|err| {
            ScsError::UpstreamError {
                status: 200,
                dump: format!("could not decode pckcerts response: {err}"),
            }
        })?;
        Ok(PckCertsReply {
            entries,
            issuer_chain: required_header(&headers, PCK_CERT_ISSUER_CHAIN_HEADER)?,
            fmspc: required_header(&headers, FMSPC_HEADER)?.to_lowercase(),
            ca_type: required_header(&headers, PCK_CERT_CA_TYPE_HEADER)?,
        })
    }

    async fn get_pck_crl(&self, ca: &str) -> Result<PckCrlReply, ScsError> {
        let (body, headers) = self
            .get("/pckcrl", &[("ca", ca), ("encoding", CRL_ENCODING)], &[])
            .await?;
        Ok(PckCrlReply {
            crl: body,
            issuer_chain: required_header(&headers, PCK_CRL_ISSUER_CHAIN_HEADER)?,
        })
    }

    async fn get_tcb_info(&self, fmspc: &str) -> Result<TcbInfoReply, ScsError> {
        let (body, headers) = self.get("/tcb", &[("fmspc", fmspc)], &[]).await?;
        Ok(TcbInfoReply {
            tcb_info: String::from_utf8_lossy(&body).into_owned(),
            issuer_chain: required_header(&headers, TCB_INFO_ISSUER_CHAIN_HEADER)?,
        })
    }

    async fn get_qe_identity(&self) -> Result<QeIdentityReply, ScsError> {
        let (body, headers) = self.get("/qe/identity", &[], &[]).await?;
        Ok(QeIdentityReply {
            qe_info: String::from_utf8_lossy(&body).into_owned(),
            issuer_chain: required_header(&headers, ENCLAVE_IDENTITY_ISSUER_CHAIN_HEADER)?,
        })
    }
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, ScsError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ScsError::UpstreamError {
            status: 200,
            dump: format!("response is missing required header {name}"),
        })
}
