//! example-build - Request a custom firmware image and wait for it
//!
//! Demonstrates the full client flow against an ASU Image Builder server:
//! - Look up the revision that will be built for the chosen target
//! - Submit a build request through the fluent builder
//! - Poll the request hash every 5 seconds while the build is queued
//!   (the polling loop lives here on purpose; the library never polls)
//! - Print the download URLs of the finished images
//!
//! Usage:
//!   example-build --target bcm27xx/bcm2711 --profile rpi-4 --version SNAPSHOT
//!   example-build -t ath79/generic -p tplink_archer-c7-v2 -v 23.05.0 --packages luci,tmux

use std::time::Duration;

use asu_client::{AsuClient, BuildResponse};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between build status polls, per the service's documentation
const POLL_INTERVAL: Duration = Duration::from_secs(5);

struct Args {
    server: String,
    target: String,
    profile: String,
    version: String,
    packages: Vec<String>,
    filesystem: Option<String>,
    replace_defaults: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut server = String::from(asu_client::DEFAULT_ENDPOINT);
    let mut target = String::from("bcm27xx/bcm2711");
    let mut profile = String::from("rpi-4");
    let mut version = String::from("SNAPSHOT");
    let mut packages: Vec<String> = Vec::new();
    let mut filesystem: Option<String> = None;
    let mut replace_defaults = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    server = args[i + 1].clone();
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --server");
                }
            }
            "--target" | "-t" => {
                if i + 1 < args.len() {
                    target = args[i + 1].clone();
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --target");
                }
            }
            "--profile" | "-p" => {
                if i + 1 < args.len() {
                    profile = args[i + 1].clone();
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --profile");
                }
            }
            "--version" | "-v" => {
                if i + 1 < args.len() {
                    version = args[i + 1].clone();
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --version");
                }
            }
            "--packages" => {
                if i + 1 < args.len() {
                    packages = args[i + 1]
                        .split(',')
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .collect();
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --packages");
                }
            }
            "--filesystem" | "-f" => {
                if i + 1 < args.len() {
                    filesystem = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    anyhow::bail!("Missing argument for --filesystem");
                }
            }
            "--replace-defaults" => {
                replace_defaults = true;
                i += 1;
            }
            "--help" | "-h" => {
                eprintln!(
                    r#"example-build - Request a custom firmware image and wait for it

Usage: example-build [OPTIONS]

Options:
  -s, --server <URL>          ASU server API root (default: {default_endpoint})
  -t, --target <TARGET>       Hardware target (default: bcm27xx/bcm2711)
  -p, --profile <PROFILE>     Hardware profile (default: rpi-4)
  -v, --version <VERSION>     Release version or SNAPSHOT (default: SNAPSHOT)
      --packages <LIST>       Comma-separated packages to include (default: none)
  -f, --filesystem <NAME>     Root filesystem: squashfs, ext4, ext4fs, ubifs, jffs2
      --replace-defaults      Treat the package list as exhaustive
  -h, --help                  Print this help message
"#,
                    default_endpoint = asu_client::DEFAULT_ENDPOINT,
                );
                std::process::exit(0);
            }
            _ => {
                tracing::warn!("Unknown argument: {}", args[i]);
                i += 1;
            }
        }
    }

    Ok(Args {
        server,
        target,
        profile,
        version,
        packages,
        filesystem,
        replace_defaults,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "example_build=info,asu_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;

    tracing::info!(
        server = %args.server,
        target = %args.target,
        profile = %args.profile,
        version = %args.version,
        "Requesting firmware image"
    );

    let client = AsuClient::with_endpoint(&args.server)?;

    // Show what revision the server would build for this target.
    let (target_name, subtarget) = args
        .target
        .split_once('/')
        .ok_or_else(|| anyhow::anyhow!("Target must be of the form <target>/<subtarget>"))?;
    match client.revision(&args.version, target_name, subtarget).await {
        Ok(info) => tracing::info!(revision = %info.revision, "Server revision"),
        Err(e) => tracing::warn!("Could not fetch revision: {}", e),
    }

    let mut builder = client
        .image_builder(&args.target, &args.profile, &args.version)
        .packages(args.packages)
        .replace_default_packages(args.replace_defaults);
    if let Some(ref filesystem) = args.filesystem {
        builder = builder.filesystem(filesystem)?;
    }

    let mut response = builder.build().await?;

    // Poll until the service reports something other than "accepted". The
    // library never polls; that loop belongs to the caller.
    loop {
        match response {
            BuildResponse::Accepted(accepted) => {
                tracing::info!(
                    request_hash = %accepted.request_hash,
                    queue_position = accepted.queue_position,
                    "Build queued, polling again in {}s",
                    POLL_INTERVAL.as_secs()
                );
                tokio::time::sleep(POLL_INTERVAL).await;
                response = client.check_build(&accepted.request_hash).await?;
            }
            BuildResponse::Completed(completed) => {
                tracing::info!(bin_dir = %completed.bin_dir, "Build complete");
                println!("Images:");
                for image in &completed.images {
                    match &image.url {
                        Some(url) => println!("  {}", url),
                        None => println!("  {}", image.name),
                    }
                }
                return Ok(());
            }
            BuildResponse::Failed(failed) => {
                if let Some(stderr) = &failed.stderr {
                    eprintln!("{}", stderr);
                }
                anyhow::bail!(
                    "Build failed with status {}: {}",
                    failed.status,
                    failed.detail.unwrap_or_else(|| "no detail".to_string())
                );
            }
        }
    }
}
