//! HTTP client for the ASU Image Builder API

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::builder::ImageBuilder;
use crate::error::{AsuClientError, Result};
use crate::types::*;

/// Default API endpoint of the public ASU instance
pub const DEFAULT_ENDPOINT: &str = "https://asu.aparcar.org/api/v1/";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// ASU Image Builder REST API client
///
/// Each client owns its endpoint, so clients talking to different server
/// instances can coexist in one process. The endpoint must be the versioned
/// API root of the server (a URL ending in `api/v1/`); the store and
/// `latest.json` locations are derived from it by walking up two path
/// segments.
#[derive(Debug, Clone)]
pub struct AsuClient {
    client: Client,
    endpoint: Url,
}

impl AsuClient {
    /// Create a client for the public ASU instance at [`DEFAULT_ENDPOINT`]
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Create a client for a specific server
    ///
    /// # Arguments
    /// * `endpoint` - Versioned API root (e.g., "http://localhost:8000/api/v1/");
    ///   a missing trailing slash is added
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        Self::with_config(endpoint, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a client with custom timeouts
    pub fn with_config(
        endpoint: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let endpoint = normalize_endpoint(endpoint)?;

        Ok(Self { client, endpoint })
    }

    /// Get the configured API endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Point this client at a different server
    ///
    /// Returns the endpoint as stored, with the trailing slash added if it
    /// was missing.
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<&Url> {
        self.endpoint = normalize_endpoint(endpoint)?;
        Ok(&self.endpoint)
    }

    /// Get a reference to the underlying HTTP client.
    ///
    /// Useful for making custom requests while reusing the client's
    /// connection pool.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Base URL of the artifact store, derived from the endpoint
    ///
    /// `https://host/api/v1/` becomes `https://host/store/`. Downloads for a
    /// completed build live under `{store}/{bin_dir}/{name}`.
    pub fn store_url(&self) -> Result<Url> {
        Ok(self.endpoint.join("../../store/")?)
    }

    /// URL of the static `latest.json` document, derived from the endpoint
    ///
    /// `https://host/api/v1/` becomes `https://host/json/v1/latest.json`.
    pub fn latest_url(&self) -> Result<Url> {
        Ok(self.endpoint.join("../../json/v1/latest.json")?)
    }

    // =========================================================================
    // Build Operations
    // =========================================================================

    /// Submit a build request
    ///
    /// The service answers with a status embedded in the body: 202 when the
    /// build was queued (poll it with [`check_build`](Self::check_build)),
    /// 200 when a matching image set already exists, and anything else for
    /// a rejected or failed build. All three come back as a
    /// [`BuildResponse`]; `Err` is reserved for transport and decoding
    /// problems. Completed builds have download URLs attached to every
    /// image.
    #[instrument(skip(self, request))]
    pub async fn build(&self, request: &BuildRequest) -> Result<BuildResponse> {
        let url = self.endpoint.join("build")?;
        debug!(
            "Requesting build of {}/{} for {} at {}",
            request.target, request.profile, request.version, url
        );

        let response = self.client.post(url).json(request).send().await?;
        self.handle_build_response(response).await
    }

    /// Poll a previously accepted build by its request hash
    ///
    /// Returns the same [`BuildResponse`] classification as
    /// [`build`](Self::build), including download URLs once the build
    /// completed. Builds typically finish within 30 seconds to 5 minutes;
    /// polling every few seconds is plenty.
    #[instrument(skip(self))]
    pub async fn check_build(&self, request_hash: &str) -> Result<BuildResponse> {
        let url = self.endpoint.join(&format!("build/{}", request_hash))?;

        let response = self.client.get(url).send().await?;
        self.handle_build_response(response).await
    }

    /// Start configuring a build request for the given device
    pub fn image_builder(&self, target: &str, profile: &str, version: &str) -> ImageBuilder<'_> {
        ImageBuilder::new(self, target, profile, version)
    }

    // =========================================================================
    // Metadata Operations
    // =========================================================================

    /// Fetch the latest published versions from the static `latest.json`
    /// document
    ///
    /// The document is served as a plain file outside the API routing and
    /// only populates `latest`; use [`overview_live`](Self::overview_live)
    /// for branch metadata.
    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<Overview> {
        let url = self.latest_url()?;
        debug!("Fetching latest versions from {}", url);

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Fetch branches and latest versions from the live `overview` route
    #[instrument(skip(self))]
    pub async fn overview_live(&self) -> Result<Overview> {
        let url = self.endpoint.join("overview")?;

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Look up the exact revision built for a target/subtarget on a version
    #[instrument(skip(self))]
    pub async fn revision(
        &self,
        version: &str,
        target: &str,
        subtarget: &str,
    ) -> Result<RevisionInfo> {
        let url = self
            .endpoint
            .join(&format!("revision/{}/{}/{}", version, target, subtarget))?;

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// Decode a build response body regardless of HTTP status
    ///
    /// Build routes embed their real status in the body, so the body is
    /// parsed even for non-2xx responses and classification follows the
    /// embedded status.
    async fn handle_build_response(&self, response: reqwest::Response) -> Result<BuildResponse> {
        let http_status = response.status().as_u16();
        let raw: RawBuildResponse = response
            .json()
            .await
            .map_err(|e| AsuClientError::ParseError(e.to_string()))?;

        let mut build = BuildResponse::from_wire(raw, http_status)?;
        if let BuildResponse::Completed(completed) = &mut build {
            self.attach_download_urls(completed)?;
        }
        Ok(build)
    }

    /// Attach an absolute download URL to every image of a completed build
    fn attach_download_urls(&self, completed: &mut BuildCompleted) -> Result<()> {
        let store = self.store_url()?;
        for image in &mut completed.images {
            image.url = Some(store.join(&format!("{}/{}", completed.bin_dir, image.name))?);
        }
        Ok(())
    }

    /// Handle response and deserialize JSON
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| AsuClientError::ParseError(e.to_string()))
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract error from a failed metadata response
    async fn extract_error(&self, response: reqwest::Response) -> AsuClientError {
        let status = response.status();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body
                .detail
                .unwrap_or_else(|| format!("HTTP {}", status)),
            Err(_) => format!("HTTP {}", status),
        };

        AsuClientError::server_error(status.as_u16(), message)
    }
}

/// Parse an endpoint and make sure it ends with a slash, so that joining
/// relative routes keeps the full path
fn normalize_endpoint(endpoint: &str) -> Result<Url> {
    let mut endpoint = Url::parse(endpoint)?;
    if !endpoint.path().ends_with('/') {
        let path = format!("{}/", endpoint.path());
        endpoint.set_path(&path);
    }
    Ok(endpoint)
}
