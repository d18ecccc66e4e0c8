//! Subcommand implementations.

use std::process::ExitCode;

use anyhow::{Context, bail};
use shotlift_upload::{
    UploadError, UploadEvent, UploadProgress, UploadRequest, UploadResult, UploadTarget, Uploader,
    ensure_extension,
};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::cli::{ConfigCommand, UploadArgs};
use crate::config::{Config, config_path};

/// Remote name used for stdin uploads without `--name`.
const STDIN_FILE_NAME: &str = "capture.png";

/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

pub async fn upload(args: UploadArgs, config: Config) -> anyhow::Result<ExitCode> {
    let target = resolve_target(&args, &config)?;

    let stdin = if args.reads_stdin() {
        let mut data = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut data)
            .await
            .context("failed to read stdin")?;
        debug!(bytes = data.len(), "read upload from stdin");
        Some(data)
    } else {
        None
    };

    let request = build_request(&args, target, stdin);
    info!(file = %request.file_name, content_type = %request.content_type, "uploading");

    let uploader = Uploader::new(config.to_uploader_config())?;
    let mut handle = uploader.submit(request);
    let mut last_percent = None;

    let outcome: Result<UploadResult, UploadError> = loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(UploadEvent::Progress(progress)) => {
                    if last_percent != Some(progress.percent) {
                        last_percent = Some(progress.percent);
                        eprintln!("{}", format_progress(&progress));
                    }
                }
                Some(UploadEvent::Completed(result)) => break Ok(result),
                Some(UploadEvent::Failed(err)) => break Err(err),
                Some(UploadEvent::Cancelled) => break Err(UploadError::Cancelled),
                Some(UploadEvent::Rejected(err)) => warn!(error = %err, "start rejected"),
                None => break Err(UploadError::Network("upload context stopped".into())),
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("cancelling upload...");
                handle.cancel();
            }
        }
    };

    let teardown = handle.shutdown().await;
    debug!(?teardown, "upload context torn down");

    match outcome {
        Ok(result) => {
            info!(image = result.image_name(), "upload finished");
            println!("{}", result.remote_url);
            Ok(ExitCode::SUCCESS)
        }
        Err(UploadError::Cancelled) => {
            eprintln!("upload cancelled");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Err(err) => bail!("upload failed ({:?}): {}", err.kind(), err.detail()),
    }
}

pub fn config(command: ConfigCommand) -> anyhow::Result<ExitCode> {
    let path = config_path();
    match command {
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save_to(&path)?;
            println!("wrote {}", path.display());
        }
        ConfigCommand::Show => {
            let config = Config::load_from(&path)?;
            print!("{}", toml::to_string_pretty(&config.masked())?);
        }
        ConfigCommand::Path => println!("{}", path.display()),
    }
    Ok(ExitCode::SUCCESS)
}

/// Flags win over the configuration file.
fn resolve_target(args: &UploadArgs, config: &Config) -> anyhow::Result<UploadTarget> {
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| config.server_endpoint.clone());
    let token = args
        .token
        .clone()
        .unwrap_or_else(|| config.upload_token.clone());

    if endpoint.trim().is_empty() {
        bail!(
            "no server endpoint: set server_endpoint in {} or pass --endpoint",
            config_path().display()
        );
    }
    if token.is_empty() {
        bail!(
            "no upload token: set upload_token in {} or pass --token",
            config_path().display()
        );
    }
    Ok(UploadTarget::new(endpoint.trim(), token))
}

fn build_request(args: &UploadArgs, target: UploadTarget, stdin: Option<Vec<u8>>) -> UploadRequest {
    let mut request = match stdin {
        Some(data) => {
            let name = args.name.as_deref().unwrap_or(STDIN_FILE_NAME);
            UploadRequest::bytes(data, name, target)
        }
        None => {
            let request = UploadRequest::file(&args.path, target);
            match &args.name {
                Some(name) => request.with_file_name(name.as_str()),
                None => request,
            }
        }
    };

    if args.png {
        let name = ensure_extension(&request.file_name, "png");
        request = request.with_file_name(name).with_content_type("image/png");
    }
    if let Some(content_type) = &args.content_type {
        request = request.with_content_type(content_type.as_str());
    }
    request
}

fn format_progress(progress: &UploadProgress) -> String {
    match progress.throughput_mbps {
        Some(mbps) => format!("{}% ({mbps:.2} Mbps)", progress.percent),
        None => format!("{}%", progress.percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(path: &str) -> UploadArgs {
        UploadArgs {
            path: PathBuf::from(path),
            name: None,
            content_type: None,
            png: false,
            endpoint: None,
            token: None,
        }
    }

    fn configured() -> Config {
        Config {
            server_endpoint: "https://api.example.com/v3".into(),
            upload_token: "file-token".into(),
            ..Config::default()
        }
    }

    #[test]
    fn target_comes_from_config() {
        let target = resolve_target(&args("a.png"), &configured()).unwrap();
        assert_eq!(target.upload_url(), "https://api.example.com/v3/gallery");
        assert_eq!(target.auth_token, "file-token");
    }

    #[test]
    fn flags_override_config() {
        let mut a = args("a.png");
        a.endpoint = Some("http://localhost:3000/api".into());
        a.token = Some("flag-token".into());
        let target = resolve_target(&a, &configured()).unwrap();
        assert_eq!(target.upload_url(), "http://localhost:3000/api/gallery");
        assert_eq!(target.auth_token, "flag-token");
    }

    #[test]
    fn missing_endpoint_or_token_is_an_error() {
        let err = resolve_target(&args("a.png"), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("endpoint"));

        let config = Config {
            upload_token: String::new(),
            ..configured()
        };
        let err = resolve_target(&args("a.png"), &config).unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn file_request_uses_local_name() {
        let target = UploadTarget::new("http://h", "t");
        let request = build_request(&args("/tmp/shots/photo.jpg"), target, None);
        assert_eq!(request.file_name, "photo.jpg");
        assert_eq!(request.content_type, "image/jpeg");
        assert!(request.source.local_path().is_some());
    }

    #[test]
    fn png_flag_and_overrides() {
        let mut a = args("/tmp/shot");
        a.name = Some("2025-01-01 12-00".into());
        a.png = true;
        a.content_type = Some("image/png".into());
        let request = build_request(&a, UploadTarget::new("http://h", "t"), None);
        assert_eq!(request.file_name, "2025-01-01 12-00.png");
        assert_eq!(request.content_type, "image/png");
    }

    #[test]
    fn png_flag_forces_png_content_type() {
        let mut a = args("/tmp/shots/shot.jpg");
        a.png = true;
        let request = build_request(&a, UploadTarget::new("http://h", "t"), None);
        assert_eq!(request.file_name, "shot.jpg.png");
        assert_eq!(request.content_type, "image/png");

        a.content_type = Some("image/webp".into());
        let request = build_request(&a, UploadTarget::new("http://h", "t"), None);
        assert_eq!(request.content_type, "image/webp");
    }

    #[test]
    fn stdin_request_is_in_memory() {
        let request = build_request(&args("-"), UploadTarget::new("http://h", "t"), Some(vec![1, 2, 3]));
        assert_eq!(request.file_name, STDIN_FILE_NAME);
        assert_eq!(request.content_type, "image/png");
        assert!(request.source.local_path().is_none());
    }

    #[test]
    fn progress_line_format() {
        let progress = UploadProgress {
            percent: 42,
            throughput_mbps: Some(12.346),
            bytes_sent: 42,
            bytes_total: 100,
        };
        assert_eq!(format_progress(&progress), "42% (12.35 Mbps)");

        let progress = UploadProgress {
            throughput_mbps: None,
            ..progress
        };
        assert_eq!(format_progress(&progress), "42%");
    }
}
