//! Request and response types for the ASU Image Builder API

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AsuClientError, Result};

// =============================================================================
// Build Request Types
// =============================================================================

/// Root filesystem of the requested image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filesystem {
    Squashfs,
    Ext4,
    Ext4Fs,
    Ubifs,
    Jffs2,
}

impl Filesystem {
    /// Filesystem names accepted by the Image Builder service
    pub const NAMES: [&'static str; 5] = ["squashfs", "ext4", "ext4fs", "ubifs", "jffs2"];

    /// Get the wire name for the build request payload
    pub fn as_str(&self) -> &'static str {
        match self {
            Filesystem::Squashfs => "squashfs",
            Filesystem::Ext4 => "ext4",
            Filesystem::Ext4Fs => "ext4fs",
            Filesystem::Ubifs => "ubifs",
            Filesystem::Jffs2 => "jffs2",
        }
    }
}

impl std::fmt::Display for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Filesystem {
    type Err = AsuClientError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        // The service matches filesystem names exactly, so no case folding here.
        match s {
            "squashfs" => Ok(Filesystem::Squashfs),
            "ext4" => Ok(Filesystem::Ext4),
            "ext4fs" => Ok(Filesystem::Ext4Fs),
            "ubifs" => Ok(Filesystem::Ubifs),
            "jffs2" => Ok(Filesystem::Jffs2),
            _ => Err(AsuClientError::InvalidFilesystem {
                value: s.to_string(),
            }),
        }
    }
}

/// Build request payload sent to `POST build`
///
/// `defaults` and `diff_packages` are always serialized, matching what the
/// service expects; `filesystem` is omitted entirely when unset so the
/// service picks the profile default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Hardware architecture, e.g. "ath79/generic"
    pub target: String,
    /// Hardware model, e.g. "tplink_archer-c7-v2"
    pub profile: String,
    /// Release version or "SNAPSHOT"
    pub version: String,
    /// Packages to include in the image
    #[serde(default)]
    pub packages: Vec<String>,
    /// First-boot (uci-defaults) script; empty means none.
    /// The service rejects scripts larger than 10 kB.
    #[serde(default)]
    pub defaults: String,
    /// When true, `packages` replaces the profile's default package set
    /// instead of extending it
    #[serde(default)]
    pub diff_packages: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Filesystem>,
}

impl BuildRequest {
    /// Create a request for the given device with no extra configuration
    pub fn new(
        target: impl Into<String>,
        profile: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            profile: profile.into(),
            version: version.into(),
            packages: Vec::new(),
            defaults: String::new(),
            diff_packages: false,
            filesystem: None,
        }
    }
}

// =============================================================================
// Build Response Types
// =============================================================================

/// Raw build response body as sent by the service
///
/// Every field is optional on the wire; [`BuildResponse::from_wire`] decides
/// which ones a given embedded status actually requires.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawBuildResponse {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub request_hash: Option<String>,
    #[serde(default)]
    pub bin_dir: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageFile>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub enqueued_at: Option<String>,
    #[serde(default)]
    pub build_at: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One artifact of a completed build
#[derive(Debug, Clone, Deserialize)]
pub struct ImageFile {
    /// File name, e.g. "openwrt-...-squashfs-sysupgrade.bin"
    pub name: String,
    /// Image kind reported by the service, e.g. "sysupgrade" or "factory"
    #[serde(default, rename = "type")]
    pub image_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    /// Absolute download URL; filled in by the client for completed builds
    #[serde(skip)]
    pub url: Option<Url>,
    /// Remaining server fields, passed through untouched
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Build accepted and queued (embedded status 202)
#[derive(Debug, Clone)]
pub struct BuildAccepted {
    /// Token for polling the build via `check_build`
    pub request_hash: String,
    pub detail: Option<String>,
    pub queue_position: Option<u32>,
    pub enqueued_at: Option<String>,
    pub extra: HashMap<String, serde_json::Value>,
}

/// Build finished and images are downloadable (embedded status 200)
#[derive(Debug, Clone)]
pub struct BuildCompleted {
    pub request_hash: Option<String>,
    /// Store directory holding this build's artifacts
    pub bin_dir: String,
    pub images: Vec<ImageFile>,
    pub detail: Option<String>,
    pub enqueued_at: Option<String>,
    pub build_at: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub extra: HashMap<String, serde_json::Value>,
}

/// Build rejected or failed (any other embedded status)
///
/// The server reports these inside an otherwise well-formed body, so they
/// come back as data rather than as an `Err`. `images` is kept exactly as
/// received, without download URLs.
#[derive(Debug, Clone)]
pub struct BuildFailed {
    /// Status embedded in the body, or the HTTP status when the body
    /// carried none
    pub status: u16,
    pub request_hash: Option<String>,
    pub detail: Option<String>,
    pub bin_dir: Option<String>,
    pub images: Vec<ImageFile>,
    pub enqueued_at: Option<String>,
    pub build_at: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub extra: HashMap<String, serde_json::Value>,
}

/// Outcome of a build submission or poll, keyed by the status the service
/// embeds in the response body
#[derive(Debug, Clone)]
pub enum BuildResponse {
    /// Queued or building; poll with the request hash
    Accepted(BuildAccepted),
    /// Images built; download URLs attached
    Completed(BuildCompleted),
    /// Soft failure reported by the service
    Failed(BuildFailed),
}

impl BuildResponse {
    /// Classify a wire response by its embedded status, falling back to the
    /// HTTP status when the body carries none (e.g. plain `{"detail": ...}`
    /// error bodies).
    pub(crate) fn from_wire(raw: RawBuildResponse, http_status: u16) -> Result<Self> {
        let status = raw.status.unwrap_or(http_status);
        match status {
            202 => {
                let request_hash = raw.request_hash.ok_or_else(|| {
                    AsuClientError::ParseError(
                        "build accepted but response carried no request_hash".to_string(),
                    )
                })?;
                Ok(BuildResponse::Accepted(BuildAccepted {
                    request_hash,
                    detail: raw.detail,
                    queue_position: raw.queue_position,
                    enqueued_at: raw.enqueued_at,
                    extra: raw.extra,
                }))
            }
            200 => {
                let bin_dir = raw.bin_dir.ok_or_else(|| {
                    AsuClientError::ParseError(
                        "completed build carried no bin_dir".to_string(),
                    )
                })?;
                Ok(BuildResponse::Completed(BuildCompleted {
                    request_hash: raw.request_hash,
                    bin_dir,
                    images: raw.images,
                    detail: raw.detail,
                    enqueued_at: raw.enqueued_at,
                    build_at: raw.build_at,
                    stdout: raw.stdout,
                    stderr: raw.stderr,
                    extra: raw.extra,
                }))
            }
            status => Ok(BuildResponse::Failed(BuildFailed {
                status,
                request_hash: raw.request_hash,
                detail: raw.detail,
                bin_dir: raw.bin_dir,
                images: raw.images,
                enqueued_at: raw.enqueued_at,
                build_at: raw.build_at,
                stdout: raw.stdout,
                stderr: raw.stderr,
                extra: raw.extra,
            })),
        }
    }

    /// Status code embedded in the response body
    pub fn status(&self) -> u16 {
        match self {
            BuildResponse::Accepted(_) => 202,
            BuildResponse::Completed(_) => 200,
            BuildResponse::Failed(failed) => failed.status,
        }
    }

    /// Request hash for polling, when the service returned one
    pub fn request_hash(&self) -> Option<&str> {
        match self {
            BuildResponse::Accepted(accepted) => Some(&accepted.request_hash),
            BuildResponse::Completed(completed) => completed.request_hash.as_deref(),
            BuildResponse::Failed(failed) => failed.request_hash.as_deref(),
        }
    }

    /// Human-readable detail line, when the service returned one
    pub fn detail(&self) -> Option<&str> {
        match self {
            BuildResponse::Accepted(accepted) => accepted.detail.as_deref(),
            BuildResponse::Completed(completed) => completed.detail.as_deref(),
            BuildResponse::Failed(failed) => failed.detail.as_deref(),
        }
    }

    /// Images reported by the service; empty unless the build finished
    pub fn images(&self) -> &[ImageFile] {
        match self {
            BuildResponse::Accepted(_) => &[],
            BuildResponse::Completed(completed) => &completed.images,
            BuildResponse::Failed(failed) => &failed.images,
        }
    }

    /// True while the build is queued or running
    pub fn is_pending(&self) -> bool {
        matches!(self, BuildResponse::Accepted(_))
    }

    /// True once images are built and downloadable
    pub fn is_complete(&self) -> bool {
        matches!(self, BuildResponse::Completed(_))
    }

    /// True when the service reported a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, BuildResponse::Failed(_))
    }
}

// =============================================================================
// Metadata Types
// =============================================================================

/// Branches and versions currently offered by the service
///
/// Both the live `overview` route and the static `latest.json` document
/// parse into this; the static document only populates `latest`.
#[derive(Debug, Clone, Deserialize)]
pub struct Overview {
    /// Currently-latest version per branch, including "SNAPSHOT"
    #[serde(default)]
    pub latest: Vec<String>,
    /// Branch metadata keyed by branch name
    #[serde(default)]
    pub branches: HashMap<String, Branch>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One release branch known to the service
#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub snapshot: Option<bool>,
    /// Versions buildable on this branch
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub updates: Option<String>,
    /// Supported target -> architecture mapping
    #[serde(default)]
    pub targets: HashMap<String, String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Exact build revision of one target/subtarget on a version
#[derive(Debug, Clone, Deserialize)]
pub struct RevisionInfo {
    /// Revision identifier, e.g. "r28066-c9d1b6781f"
    pub revision: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Error body shape used by metadata routes
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filesystem_parses_wire_names() {
        for (name, expected) in [
            ("squashfs", Filesystem::Squashfs),
            ("ext4", Filesystem::Ext4),
            ("ext4fs", Filesystem::Ext4Fs),
            ("ubifs", Filesystem::Ubifs),
            ("jffs2", Filesystem::Jffs2),
        ] {
            assert_eq!(name.parse::<Filesystem>().unwrap(), expected);
            assert_eq!(expected.as_str(), name);
        }
    }

    #[test]
    fn filesystem_rejects_unknown_names() {
        let err = "btrfs".parse::<Filesystem>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("btrfs"));
        assert!(message.contains("squashfs"));
        assert!(message.contains("jffs2"));
    }

    #[test]
    fn filesystem_names_are_case_sensitive() {
        assert!("SQUASHFS".parse::<Filesystem>().is_err());
        assert!("Ext4".parse::<Filesystem>().is_err());
    }

    #[test]
    fn filesystem_serializes_to_wire_name() {
        let value = serde_json::to_value(Filesystem::Ext4Fs).unwrap();
        assert_eq!(value, json!("ext4fs"));
    }

    #[test]
    fn build_request_serializes_defaults_even_when_empty() {
        let request = BuildRequest::new("ath79/generic", "tplink_archer-c7-v2", "23.05.0");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["target"], "ath79/generic");
        assert_eq!(body["profile"], "tplink_archer-c7-v2");
        assert_eq!(body["version"], "23.05.0");
        assert_eq!(body["packages"], json!([]));
        assert_eq!(body["defaults"], "");
        assert_eq!(body["diff_packages"], false);
        assert!(body.get("filesystem").is_none());
    }

    #[test]
    fn build_request_includes_filesystem_when_set() {
        let mut request = BuildRequest::new("x86/64", "generic", "SNAPSHOT");
        request.filesystem = Some(Filesystem::Ext4);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["filesystem"], "ext4");
    }

    #[test]
    fn accepted_response_requires_request_hash() {
        let raw: RawBuildResponse =
            serde_json::from_value(json!({"status": 202, "detail": "queued"})).unwrap();
        assert!(BuildResponse::from_wire(raw, 202).is_err());
    }

    #[test]
    fn accepted_response_carries_queue_fields() {
        let raw: RawBuildResponse = serde_json::from_value(json!({
            "status": 202,
            "request_hash": "0badc0ffee",
            "detail": "queued",
            "queue_position": 3,
        }))
        .unwrap();
        let response = BuildResponse::from_wire(raw, 202).unwrap();
        assert!(response.is_pending());
        assert_eq!(response.request_hash(), Some("0badc0ffee"));
        match response {
            BuildResponse::Accepted(accepted) => {
                assert_eq!(accepted.queue_position, Some(3));
            }
            other => panic!("expected accepted response, got {other:?}"),
        }
    }

    #[test]
    fn completed_response_requires_bin_dir() {
        let raw: RawBuildResponse =
            serde_json::from_value(json!({"status": 200, "request_hash": "abc"})).unwrap();
        assert!(BuildResponse::from_wire(raw, 200).is_err());
    }

    #[test]
    fn completed_response_carries_images() {
        let raw: RawBuildResponse = serde_json::from_value(json!({
            "status": 200,
            "request_hash": "abc123",
            "bin_dir": "ath79/generic/tplink_archer-c7-v2",
            "images": [
                {"name": "sysupgrade.bin", "type": "sysupgrade", "sha256": "aa"},
                {"name": "factory.bin", "type": "factory"},
            ],
        }))
        .unwrap();
        let response = BuildResponse::from_wire(raw, 200).unwrap();
        assert!(response.is_complete());
        assert_eq!(response.images().len(), 2);
        assert_eq!(response.images()[0].image_type.as_deref(), Some("sysupgrade"));
        assert!(response.images()[0].url.is_none());
    }

    #[test]
    fn embedded_status_wins_over_http_status() {
        let raw: RawBuildResponse = serde_json::from_value(json!({
            "status": 500,
            "detail": "build failed",
            "stderr": "make: *** [world] Error 1",
        }))
        .unwrap();
        let response = BuildResponse::from_wire(raw, 200).unwrap();
        assert!(response.is_failure());
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn body_without_status_falls_back_to_http_status() {
        let raw: RawBuildResponse =
            serde_json::from_value(json!({"detail": "could not find provided request hash"}))
                .unwrap();
        let response = BuildResponse::from_wire(raw, 404).unwrap();
        match response {
            BuildResponse::Failed(failed) => {
                assert_eq!(failed.status, 404);
                assert_eq!(
                    failed.detail.as_deref(),
                    Some("could not find provided request hash")
                );
            }
            other => panic!("expected failed response, got {other:?}"),
        }
    }

    #[test]
    fn failed_response_keeps_images_untouched() {
        let raw: RawBuildResponse = serde_json::from_value(json!({
            "status": 422,
            "detail": "Unsupported profile",
            "images": [{"name": "leftover.bin"}],
        }))
        .unwrap();
        let response = BuildResponse::from_wire(raw, 422).unwrap();
        assert_eq!(response.images().len(), 1);
        assert!(response.images()[0].url.is_none());
    }

    #[test]
    fn unknown_response_fields_are_preserved() {
        let raw: RawBuildResponse = serde_json::from_value(json!({
            "status": 202,
            "request_hash": "abc",
            "imagebuilder_status": "queued",
        }))
        .unwrap();
        let response = BuildResponse::from_wire(raw, 202).unwrap();
        match response {
            BuildResponse::Accepted(accepted) => {
                assert_eq!(accepted.extra["imagebuilder_status"], json!("queued"));
            }
            other => panic!("expected accepted response, got {other:?}"),
        }
    }

    #[test]
    fn overview_parses_branches_and_latest() {
        let overview: Overview = serde_json::from_value(json!({
            "latest": ["23.05.0", "SNAPSHOT"],
            "branches": {
                "SNAPSHOT": {
                    "name": "SNAPSHOT",
                    "enabled": true,
                    "snapshot": true,
                    "versions": ["SNAPSHOT"],
                    "git_branch": "main",
                    "targets": {"ath79/generic": "mips_24kc"},
                },
            },
            "server": {"version": "0.8.0"},
        }))
        .unwrap();
        assert!(overview.latest.contains(&"SNAPSHOT".to_string()));
        let branch = &overview.branches["SNAPSHOT"];
        assert_eq!(branch.snapshot, Some(true));
        assert_eq!(branch.targets["ath79/generic"], "mips_24kc");
        assert!(overview.extra.contains_key("server"));
    }

    #[test]
    fn latest_document_parses_without_branches() {
        let overview: Overview =
            serde_json::from_value(json!({"latest": ["24.10.0", "SNAPSHOT"]})).unwrap();
        assert_eq!(overview.latest.len(), 2);
        assert!(overview.branches.is_empty());
    }

    #[test]
    fn revision_info_parses() {
        let info: RevisionInfo =
            serde_json::from_value(json!({"revision": "r28066-c9d1b6781f"})).unwrap();
        assert_eq!(info.revision, "r28066-c9d1b6781f");
    }
}
