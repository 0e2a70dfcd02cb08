//! Fluent builder for firmware image requests

use crate::client::AsuClient;
use crate::error::Result;
use crate::types::{BuildRequest, BuildResponse};

/// Accumulates an image configuration and submits it through an
/// [`AsuClient`]
///
/// Target, profile and version are fixed at construction; everything else
/// is chained:
///
/// ```no_run
/// # async fn demo() -> asu_client::Result<()> {
/// use asu_client::AsuClient;
///
/// let client = AsuClient::new()?;
/// let response = client
///     .image_builder("bcm27xx/bcm2711", "rpi-4", "SNAPSHOT")
///     .packages(["luci", "tailscale"])
///     .filesystem("squashfs")?
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ImageBuilder<'a> {
    client: &'a AsuClient,
    request: BuildRequest,
}

impl<'a> ImageBuilder<'a> {
    /// Start a request for the given device
    pub fn new(client: &'a AsuClient, target: &str, profile: &str, version: &str) -> Self {
        Self {
            client,
            request: BuildRequest::new(target, profile, version),
        }
    }

    /// Set the packages to include, replacing any previously set list
    pub fn packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.packages = packages.into_iter().map(Into::into).collect();
        self
    }

    /// Set a first-boot (uci-defaults) script baked into the image
    ///
    /// The service rejects scripts larger than 10 kB; the size is not
    /// checked here.
    pub fn uci_defaults(mut self, script: impl Into<String>) -> Self {
        self.request.defaults = script.into();
        self
    }

    /// Select the root filesystem by its wire name
    ///
    /// Fails immediately for names the service does not know, so typos
    /// surface before anything is sent.
    pub fn filesystem(mut self, filesystem: &str) -> Result<Self> {
        self.request.filesystem = Some(filesystem.parse()?);
        Ok(self)
    }

    /// Make the package list exhaustive instead of additive
    ///
    /// When set, the profile's default packages are dropped and the image
    /// contains exactly the packages given to [`packages`](Self::packages).
    pub fn replace_default_packages(mut self, replace: bool) -> Self {
        self.request.diff_packages = replace;
        self
    }

    /// The request as it would be submitted
    pub fn request(&self) -> &BuildRequest {
        &self.request
    }

    /// Submit the configured request
    ///
    /// Delegates to [`AsuClient::build`]; the builder stays usable, so the
    /// same configuration can be submitted again (e.g. after the server
    /// evicted a queued build).
    pub async fn build(&self) -> Result<BuildResponse> {
        self.client.build(&self.request).await
    }

    /// Poll a build previously accepted for this configuration
    pub async fn check_build(&self, request_hash: &str) -> Result<BuildResponse> {
        self.client.check_build(request_hash).await
    }
}

/// Capability to produce an [`ImageBuilder`] for a given version
///
/// Extension point for device-aware types that already know their target
/// and profile. The version stays caller-chosen, so one device can build
/// images for several releases.
pub trait ImageBuilderProvider {
    /// Construct a request builder for the given version
    fn image_builder(&self, version: &str) -> ImageBuilder<'_>;
}

impl ImageBuilderProvider for ImageBuilder<'_> {
    /// Fork this builder for another version, keeping the device and the
    /// accumulated configuration
    fn image_builder(&self, version: &str) -> ImageBuilder<'_> {
        let mut request = self.request.clone();
        request.version = version.to_string();
        ImageBuilder {
            client: self.client,
            request,
        }
    }
}
