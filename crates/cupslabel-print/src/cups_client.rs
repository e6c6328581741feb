// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS client over IPP.
//
// The rest of the crate only sees the `CupsBackend` / `CupsConnection`
// traits, which carry the operations a CUPS binding has to offer:
//   - configure server, port and user, with a password supplied on demand
//   - open a connection
//   - list printers             (CUPS-Get-Printers)
//   - submit a file to a queue  (Print-Job, RFC 8011 §4.2.1)
//
// `IppCupsBackend` implements them with the `ipp` crate's async client.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ipp::error::IppError;
use ipp::prelude::*;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, error, info, instrument, warn};

use cupslabel_core::settings::ConnectionSettings;
use cupslabel_core::types::PrinterChoice;

/// Document format of every label we submit.
pub const LABEL_DOCUMENT_FORMAT: &str = "application/pdf";

/// Default bound on connect probes and IPP requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failures reported by a CUPS client binding.
#[derive(Debug, Error)]
pub enum CupsError {
    #[error("server {address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("authentication rejected for user '{user}'")]
    AuthenticationRejected { user: String },

    #[error("{0}")]
    Protocol(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the password lazily, only when the server asks for credentials.
pub trait SecretProvider: Send + Sync {
    fn secret(&self) -> Option<String>;
}

impl<F> SecretProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn secret(&self) -> Option<String> {
        self()
    }
}

/// Opens connections to a CUPS server.
#[async_trait]
pub trait CupsBackend: Send + Sync {
    /// Open a connection to the server named by `settings`.
    ///
    /// `settings.password` is not sent up front; the connection asks
    /// `secret` for it when challenged.
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        secret: Arc<dyn SecretProvider>,
    ) -> Result<Arc<dyn CupsConnection>, CupsError>;
}

/// A live connection to one CUPS server.
#[async_trait]
pub trait CupsConnection: Send + Sync {
    /// All printer queues the server advertises.
    async fn list_printers(&self) -> Result<Vec<PrinterChoice>, CupsError>;

    /// Submit the file at `path` to `printer` as one job. Returns the job id
    /// assigned by the server.
    async fn print_file(&self, printer: &str, path: &Path, title: &str) -> Result<i32, CupsError>;
}

/// `CupsBackend` speaking IPP to a CUPS server.
#[derive(Debug, Clone)]
pub struct IppCupsBackend {
    timeout: Duration,
}

impl Default for IppCupsBackend {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl IppCupsBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CupsBackend for IppCupsBackend {
    #[instrument(skip(self, secret), fields(server = %settings.server, port = settings.port))]
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        secret: Arc<dyn SecretProvider>,
    ) -> Result<Arc<dyn CupsConnection>, CupsError> {
        let address = settings.address();

        // IPP is request/response over HTTP; "connecting" means proving the
        // server answers on its port. Credentials are negotiated per request.
        debug!("probing CUPS server");
        tokio::time::timeout(
            self.timeout,
            TcpStream::connect((settings.server.as_str(), settings.port)),
        )
        .await
        .map_err(|_| CupsError::Unreachable {
            address: address.clone(),
            reason: format!("timed out after {}s", self.timeout.as_secs()),
        })?
        .map_err(|e| CupsError::Unreachable {
            address: address.clone(),
            reason: e.to_string(),
        })?;

        info!(address = %address, "connected to CUPS server");
        Ok(Arc::new(IppCupsConnection {
            host: uri_host(&settings.server),
            port: settings.port,
            address,
            user: requesting_user(&settings.user),
            secret,
            timeout: self.timeout,
            accepted_password: Mutex::new(None),
        }))
    }
}

/// Connection state for one CUPS server.
struct IppCupsConnection {
    host: String,
    port: u16,
    address: String,
    user: String,
    secret: Arc<dyn SecretProvider>,
    timeout: Duration,
    /// Password the server accepted; sent up front on later requests.
    accepted_password: Mutex<Option<String>>,
}

enum Attempt {
    Done(IppRequestResponse),
    Challenged,
}

impl IppCupsConnection {
    fn server_uri(&self) -> Result<Uri, CupsError> {
        parse_uri(&format!("ipp://{}:{}/", self.host, self.port))
    }

    fn printer_uri(&self, printer: &str) -> Result<Uri, CupsError> {
        validate_printer_name(printer)?;
        parse_uri(&format!("ipp://{}:{}/printers/{}", self.host, self.port, printer))
    }

    fn remembered_password(&self) -> Option<String> {
        self.accepted_password.lock().ok().and_then(|p| p.clone())
    }

    fn remember_password(&self, password: String) {
        if let Ok(mut slot) = self.accepted_password.lock() {
            *slot = Some(password);
        }
    }

    /// Send a request, answering one authentication challenge with the
    /// password from the secret provider.
    ///
    /// `make_request` is called again for the authenticated attempt because
    /// a request (and its payload) is consumed by sending it.
    async fn send<F>(&self, target: &Uri, operation: &str, make_request: F) -> Result<IppRequestResponse, CupsError>
    where
        F: Fn() -> Result<IppRequestResponse, CupsError>,
    {
        let remembered = self.remembered_password();
        let had_password = remembered.is_some();

        let response = match self.send_once(target, make_request()?, remembered.as_deref()).await? {
            Attempt::Done(response) => response,
            Attempt::Challenged if had_password => {
                warn!(operation, "stored credentials no longer accepted");
                return Err(self.rejected());
            }
            Attempt::Challenged => {
                debug!(operation, "server requested credentials");
                let Some(password) = self.secret.secret() else {
                    return Err(self.rejected());
                };
                match self.send_once(target, make_request()?, Some(&password)).await? {
                    Attempt::Done(response) => {
                        self.remember_password(password);
                        response
                    }
                    Attempt::Challenged => return Err(self.rejected()),
                }
            }
        };

        let code = response.header().status_code();
        if !code.is_success() {
            let keyword = status_keyword(&format!("{code:?}"));
            error!(operation, status = %keyword, "IPP request failed");
            return Err(CupsError::Protocol(format!("{operation} returned status {keyword}")));
        }
        Ok(response)
    }

    async fn send_once(
        &self,
        target: &Uri,
        request: IppRequestResponse,
        password: Option<&str>,
    ) -> Result<Attempt, CupsError> {
        let mut builder = AsyncIppClient::builder(target.clone()).request_timeout(self.timeout);
        if let Some(password) = password {
            builder = builder.basic_auth(&self.user, password);
        }
        let client = builder.build();

        match client.send(request).await {
            Ok(response) => {
                let code = response.header().status_code();
                if matches!(
                    code,
                    StatusCode::ClientErrorNotAuthenticated | StatusCode::ClientErrorNotAuthorized
                ) {
                    Ok(Attempt::Challenged)
                } else {
                    Ok(Attempt::Done(response))
                }
            }
            Err(e) if is_auth_challenge(&e) => Ok(Attempt::Challenged),
            Err(e) => Err(classify_transport_error(&self.address, e.to_string())),
        }
    }

    fn rejected(&self) -> CupsError {
        CupsError::AuthenticationRejected {
            user: self.user.clone(),
        }
    }
}

#[async_trait]
impl CupsConnection for IppCupsConnection {
    #[instrument(skip(self), fields(address = %self.address))]
    async fn list_printers(&self) -> Result<Vec<PrinterChoice>, CupsError> {
        let target = self.server_uri()?;
        let response = self
            .send(&target, "CUPS-Get-Printers", || {
                Ok(IppOperationBuilder::cups().get_printers().into())
            })
            .await?;

        let printers = parse_printers(response.attributes());
        debug!(count = printers.len(), "received printer list");
        Ok(printers)
    }

    #[instrument(skip(self, path), fields(address = %self.address))]
    async fn print_file(&self, printer: &str, path: &Path, title: &str) -> Result<i32, CupsError> {
        let target = self.printer_uri(printer)?;
        let response = self
            .send(&target, "Print-Job", || {
                let payload = IppPayload::new(std::fs::File::open(path)?);
                Ok(IppOperationBuilder::print_job(target.clone(), payload)
                    .user_name(&self.user)
                    .job_title(title)
                    .document_format(LABEL_DOCUMENT_FORMAT)
                    .build()
                    .into())
            })
            .await?;

        let job_id = extract_job_id(response.attributes())
            .ok_or_else(|| CupsError::Protocol("Print-Job response missing job-id attribute".into()))?;

        info!(job_id, "print job accepted by CUPS");
        Ok(job_id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uri(raw: &str) -> Result<Uri, CupsError> {
    raw.parse()
        .map_err(|e| CupsError::Protocol(format!("invalid URI '{raw}': {e}")))
}

/// Host part of a URI; IPv6 literals need brackets.
fn uri_host(server: &str) -> String {
    if server.contains(':') && !server.starts_with('[') {
        format!("[{server}]")
    } else {
        server.to_string()
    }
}

/// User name sent as `requesting-user-name` and for basic auth.
fn requesting_user(configured: &str) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    std::env::var("USER").unwrap_or_else(|_| "cupslabel".into())
}

/// CUPS queue names cannot contain these; rejecting them early keeps a bad
/// setting from turning into a request against some other resource.
fn validate_printer_name(name: &str) -> Result<(), CupsError> {
    if name.is_empty() {
        return Err(CupsError::Protocol("printer name is empty".into()));
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '#' || c == '?' || c.is_whitespace() || c.is_control())
    {
        return Err(CupsError::Protocol(format!("invalid printer name '{name}'")));
    }
    Ok(())
}

/// `ClientErrorNotFound` → `client-error-not-found`.
fn status_keyword(debug_name: &str) -> String {
    let mut out = String::with_capacity(debug_name.len() + 4);
    for (i, c) in debug_name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// An HTTP 401 surfaces as a transport error rather than an IPP status.
fn is_auth_challenge(error: &IppError) -> bool {
    matches!(error, IppError::RequestError(401))
}

fn classify_transport_error(address: &str, detail: String) -> CupsError {
    let lower = detail.to_ascii_lowercase();
    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("broken pipe")
        || lower.contains("dns")
        || lower.contains("error trying to connect")
    {
        CupsError::Unreachable {
            address: address.to_string(),
            reason: detail,
        }
    } else {
        CupsError::Protocol(detail)
    }
}

/// Pair each queue name with its description.
fn parse_printers(attrs: &IppAttributes) -> Vec<PrinterChoice> {
    let pairs = attrs
        .groups_of(DelimiterTag::PrinterAttributes)
        .map(|group| {
            let attributes = group.attributes();
            (
                attributes.get("printer-name").map(|a| format!("{}", a.value())),
                attributes.get("printer-info").map(|a| format!("{}", a.value())),
            )
        })
        .collect();
    choices_from_pairs(pairs)
}

fn choices_from_pairs(pairs: Vec<(Option<String>, Option<String>)>) -> Vec<PrinterChoice> {
    pairs
        .into_iter()
        .filter_map(|(name, info)| {
            let name = name.filter(|n| !n.is_empty())?;
            Some(PrinterChoice::new(name, info))
        })
        .collect()
}

/// Extract the `job-id` integer from a response's Job Attributes group.
fn extract_job_id(attrs: &IppAttributes) -> Option<i32> {
    for group in attrs.groups_of(DelimiterTag::JobAttributes) {
        if let Some(attr) = group.attributes().get("job-id")
            && let IppValue::Integer(id) = attr.value()
        {
            return Some(*id);
        }
    }
    None
}
