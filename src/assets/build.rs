//! Startup check for the viewer bundle

use std::path::Path;

use tokio::process::Command;
use tracing::{info, instrument};

use crate::config::ViewerConfig;
use crate::error::{RelayError, Result};

/// Make sure the viewer template exists before traffic is accepted.
///
/// When it is missing and a build command is configured, the command runs
/// once and the template is checked again.
#[instrument(skip(config), fields(template = %config.template_path.display()))]
pub async fn ensure_viewer_bundle(config: &ViewerConfig) -> Result<()> {
    if is_file(&config.template_path).await {
        return Ok(());
    }

    let Some(command) = config.build_command.as_deref() else {
        return Err(RelayError::ViewerBundleMissing(config.template_path.clone()));
    };

    info!(command, "Viewer bundle missing, building");
    run_build(command).await?;
    info!("Viewer build finished");

    if is_file(&config.template_path).await {
        Ok(())
    } else {
        Err(RelayError::ViewerBundleMissing(config.template_path.clone()))
    }
}

async fn run_build(command: &str) -> Result<()> {
    let mut argv = command.split_whitespace();
    let program = argv
        .next()
        .ok_or_else(|| RelayError::BuildFailed("empty build command".into()))?;

    let status = Command::new(program)
        .args(argv)
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| RelayError::BuildFailed(format!("{}: {}", program, e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(RelayError::BuildFailed(format!("{} exited with {}", command, status)))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn viewer_config(template_path: PathBuf, build_command: Option<&str>) -> ViewerConfig {
        ViewerConfig {
            logger_host: String::new(),
            asset_dir: template_path.parent().unwrap().to_path_buf(),
            template_path,
            host_placeholder: "loggerhost".to_string(),
            build_command: build_command.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_existing_bundle_passes() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("index.html");
        std::fs::write(&template, "<html></html>").unwrap();

        ensure_viewer_bundle(&viewer_config(template, None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_bundle_without_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = viewer_config(dir.path().join("index.html"), None);

        assert!(matches!(
            ensure_viewer_bundle(&config).await,
            Err(RelayError::ViewerBundleMissing(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_command_produces_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("index.html");
        let command = format!("touch {}", template.display());
        let config = viewer_config(template.clone(), Some(&command));

        ensure_viewer_bundle(&config).await.unwrap();
        assert!(template.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_build_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = viewer_config(dir.path().join("index.html"), Some("false"));

        assert!(matches!(
            ensure_viewer_bundle(&config).await,
            Err(RelayError::BuildFailed(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_that_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = viewer_config(dir.path().join("index.html"), Some("true"));

        assert!(matches!(
            ensure_viewer_bundle(&config).await,
            Err(RelayError::ViewerBundleMissing(_))
        ));
    }
}
