use std::path::Path;

use aidj_client::upload::{UploadClient, UploadConfig};
use aidj_client::{ChannelConfig, JobChannel, JobHandlers};
use aidj_core::job_events::JobEvent;
use aidj_core::upload::validate_audio_upload;
use anyhow::Context;
use tokio::sync::mpsc;

use crate::ui::{self, JobProgress, Outcome, UploadBar};

/// Follow one job until it reaches a terminal event or the user hits Ctrl-C.
pub async fn follow(job_id: &str, config: &ChannelConfig) -> anyhow::Result<()> {
    let progress = JobProgress::start(job_id);
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

    let handlers = {
        let on_stage = progress.clone();
        let on_log = progress.clone();
        let on_progress = progress.clone();
        let on_message = progress.clone();
        JobHandlers::new()
            .on_stage_update(move |stage, name, status| on_stage.stage(stage, name, status))
            .on_log(move |message, level| on_log.log(message, level))
            .on_progress(move |percent| on_progress.progress(percent))
            .on_message(move |message| {
                let Some(event) = message.event() else {
                    tracing::debug!(kind = message.kind(), "Ignoring unknown event");
                    return;
                };
                if let Some(notice) = status_notice(event) {
                    on_message.notice(notice);
                }
                if let Some(outcome) = terminal_outcome(event) {
                    let _ = outcome_tx.send(outcome);
                }
            })
    };

    let mut channel = JobChannel::connect_websocket(job_id, handlers, config);

    let mut states = channel.state_changes();
    let state_view = progress.clone();
    let watcher = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            state_view.connection(state);
        }
    });

    let outcome = tokio::select! {
        outcome = outcome_rx.recv() => outcome,
        _ = tokio::signal::ctrl_c() => None,
    };

    channel.close();
    channel.closed().await;
    watcher.abort();

    match outcome {
        Some(outcome) => {
            progress.finish(&outcome);
            match outcome {
                Outcome::Complete { .. } => Ok(()),
                Outcome::Failed { message } => anyhow::bail!("job {job_id} failed: {message}"),
                Outcome::Cancelled => anyhow::bail!("job {job_id} was cancelled"),
            }
        }
        None => {
            progress.abandon();
            Ok(())
        }
    }
}

pub async fn upload(path: &Path, config: &UploadConfig) -> anyhow::Result<()> {
    let (file_name, bytes) = read_audio_file(path).await?;

    let client = UploadClient::new(config)?;
    let bar = UploadBar::start(&file_name, bytes.len() as u64);
    let result = client.upload_audio(&file_name, bytes, bar.observer()).await;
    bar.finish();

    let uploaded = result?;
    println!("{}", uploaded.url);
    if let Some(message) = uploaded.message {
        tracing::info!(%message, "Server response");
    }
    Ok(())
}

/// Validate name and size from metadata before loading the file.
async fn read_audio_file(path: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?
        .to_string();
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    validate_audio_upload(&file_name, metadata.len())?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok((file_name, bytes))
}

pub async fn files(config: &UploadConfig) -> anyhow::Result<()> {
    let client = UploadClient::new(config)?;
    let files = client.list_files().await?;
    ui::print_files(&files);
    Ok(())
}

pub async fn delete(filename: &str, config: &UploadConfig) -> anyhow::Result<()> {
    let client = UploadClient::new(config)?;
    client.delete_file(filename).await?;
    println!("Deleted {filename}");
    Ok(())
}

fn terminal_outcome(event: &JobEvent) -> Option<Outcome> {
    if !event.is_terminal() {
        return None;
    }
    let outcome = match event {
        JobEvent::Complete { mix_url, .. } => Outcome::Complete {
            mix_url: mix_url.clone(),
        },
        JobEvent::Error { message } => Outcome::Failed {
            message: message.clone(),
        },
        _ => Outcome::Cancelled,
    };
    Some(outcome)
}

fn status_notice(event: &JobEvent) -> Option<&str> {
    match event {
        JobEvent::Paused { message } => Some(message.as_deref().unwrap_or("Paused")),
        JobEvent::Resumed { message } => Some(message.as_deref().unwrap_or("Resumed")),
        _ => None,
    }
}
