use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::DateTime;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fg_core::constants::EXAMPLE_PROMPTS;
use fg_core::{TaskSnapshot, TaskStatus};
use reqwest::Url;

use crate::backend::{GenBackend, http_client};
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::AppError;
use crate::events::{EventBus, TaskEvent};
use crate::generator::{GatewayClient, Generator, TaskGateway};
use crate::quota::GenerationQuota;
use crate::tracker::{BackoffPolicy, DEFAULT_REFRESH_INTERVAL, PollOutcome, TaskStore, Tracker};

pub async fn run(cli: Cli, mut config: Config) -> anyhow::Result<()> {
    if let Some(gateway) = cli.gateway.as_deref() {
        config.gateway_url = gateway.trim_end_matches('/').to_string();
    }

    let options = cli.command.generation_options().unwrap_or_default();

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(&config).await
        }
        Commands::Generate { prompt, no_wait, .. } => {
            let client = Arc::new(gateway_client(&config)?);
            let events = EventBus::default();
            let quota = GenerationQuota::load(&config.quota_file)?;
            let mut generator = Generator::new(client.clone(), events.clone(), quota);

            let session = (!no_wait).then(|| Session::start(client, &events));
            let task_id = generator.generate(&prompt, &options).await?;
            let quota = generator.quota();
            println!("{task_id}");
            println!("{} of {} free generations left", quota.remaining(), quota.limit());

            match session {
                Some(session) => session.follow(&task_id, None).await,
                None => Ok(()),
            }
        }
        Commands::Texture {
            preview_task_id,
            no_pbr,
            no_wait,
        } => {
            let client = Arc::new(gateway_client(&config)?);
            let events = EventBus::default();
            let quota = GenerationQuota::load(&config.quota_file)?;
            let generator = Generator::new(client.clone(), events.clone(), quota);

            let session = (!no_wait).then(|| Session::start(client, &events));
            let task_id = generator.texture(&preview_task_id, !no_pbr).await?;
            println!("{task_id}");

            match session {
                Some(session) => session.follow(&task_id, Some(preview_task_id.as_str())).await,
                None => Ok(()),
            }
        }
        Commands::List => {
            let client = gateway_client(&config)?;
            let mut store = TaskStore::default();
            store.replace_all(client.list_tasks().await?);
            if store.all().is_empty() {
                println!("No tasks yet. Try: forge3d generate \"{}\"", EXAMPLE_PROMPTS[0]);
                return Ok(());
            }

            print_section("Models", store.models());
            print_section("Textured models", store.textured());
            print_section("In progress", store.in_progress().iter());
            Ok(())
        }
        Commands::Download {
            task_id,
            format,
            map,
            set,
            out,
        } => {
            let client = gateway_client(&config)?;
            let snapshot = client.fetch_task(&task_id).await?;
            let (url, default_name) = match map {
                Some(map) => {
                    let url = snapshot.texture_url(set, map).ok_or_else(|| AppError::TextureUnavailable {
                        task_id: task_id.clone(),
                        set,
                        map: map.to_string(),
                    })?;
                    (url, format!("{task_id}_{map}_{set}.{}", texture_extension(url)))
                }
                None => {
                    let url = snapshot.model_url(format).ok_or_else(|| AppError::ModelUnavailable {
                        task_id: task_id.clone(),
                        format: format.extension().to_string(),
                    })?;
                    (url, format!("{task_id}.{}", format.extension()))
                }
            };

            let dest = out.unwrap_or_else(|| PathBuf::from(default_name));
            let bytes = client.download(url, &dest).await?;
            println!("Saved {} ({bytes} bytes)", dest.display());
            Ok(())
        }
        Commands::CheckKey => {
            let status = gateway_client(&config)?.check_key().await?;
            match (status.is_set, status.message.as_deref()) {
                (true, _) => println!("API key is set"),
                (false, Some(message)) => println!("{message}"),
                (false, None) => println!("API key is not set"),
            }
            if let Some(warning) = status.warning {
                println!("warning: {warning}");
            }
            if !status.is_set {
                anyhow::bail!("gateway has no usable API key");
            }
            Ok(())
        }
        Commands::Quota { reset } => {
            let mut quota = GenerationQuota::load(&config.quota_file)?;
            if reset {
                quota.reset()?;
            }
            println!("{} of {} free generations used", quota.used(), quota.limit());
            Ok(())
        }
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    if config.credential.resolve().is_none() {
        warn!("MESHY_API_KEY is not set; task requests will fail until it is");
    }

    let backend = GenBackend::new(config)?;
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });

    backend.serve(shutdown).await
}

fn gateway_client(config: &Config) -> anyhow::Result<GatewayClient> {
    let http = http_client().context("failed to build HTTP client")?;
    Ok(GatewayClient::new(http, config.gateway_url.clone()))
}

/// A tracker plus an event subscription taken before the create call.
struct Session {
    tracker: Arc<Tracker>,
    rx: tokio::sync::broadcast::Receiver<TaskEvent>,
}

impl Session {
    fn start(gateway: Arc<GatewayClient>, events: &EventBus) -> Self {
        let tracker = Arc::new(Tracker::new(gateway, events.clone(), BackoffPolicy::default()));
        tracker.spawn_listener();
        tracker.spawn_reconciler(DEFAULT_REFRESH_INTERVAL);
        Self {
            tracker,
            rx: events.subscribe(),
        }
    }

    /// Prints progress for `task_id` until polling for it stops.
    async fn follow(mut self, task_id: &str, preview_task_id: Option<&str>) -> anyhow::Result<()> {
        let mut view = FollowView::new(task_id, preview_task_id);
        let mut last: Option<TaskSnapshot> = None;
        let outcome = loop {
            let event = tokio::select! {
                _ = tokio::signal::ctrl_c() => break PollOutcome::Cancelled,
                event = self.rx.recv() => event,
            };

            let event = match event {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break PollOutcome::Cancelled,
            };

            let texturing = match preview_task_id {
                Some(preview) => self.tracker.store().read().await.is_texturing(preview),
                None => false,
            };
            for line in view.lines(&event, texturing) {
                println!("{line}");
            }

            match event {
                TaskEvent::Updated(snapshot) if snapshot.id == task_id => last = Some(snapshot),
                TaskEvent::PollingStopped { task_id: id, outcome } if id == task_id => break outcome,
                _ => {}
            }
        };

        // Prefer the store: the post-completion refresh may carry more detail.
        let stored = self.tracker.store().read().await.get(task_id).cloned();
        let snapshot = stored.or(last);
        self.tracker.shutdown().await;

        match (outcome, snapshot) {
            (PollOutcome::Finished(TaskStatus::Succeeded), Some(task)) => {
                for line in result_lines(&task) {
                    println!("{line}");
                }
                Ok(())
            }
            (PollOutcome::Finished(_), Some(task)) => {
                anyhow::bail!("{}", task.error_message().unwrap_or("Task failed"))
            }
            (PollOutcome::Finished(status), None) => anyhow::bail!("task ended with status {status}"),
            (PollOutcome::Exhausted { attempts }, _) => {
                anyhow::bail!("gave up after {attempts} failed status checks; task {task_id} may still finish")
            }
            (PollOutcome::TimedOut, _) => anyhow::bail!("timed out waiting for task {task_id}"),
            (PollOutcome::Cancelled, _) => {
                println!("Stopped following {task_id}");
                Ok(())
            }
        }
    }
}

/// Console lines for the bus events seen while following one task.
#[derive(Debug)]
struct FollowView {
    task_id: String,
    preview_task_id: Option<String>,
    thumbnail_shown: bool,
    in_progress: Option<usize>,
}

impl FollowView {
    fn new(task_id: &str, preview_task_id: Option<&str>) -> Self {
        Self {
            task_id: task_id.to_string(),
            preview_task_id: preview_task_id.map(str::to_string),
            thumbnail_shown: false,
            in_progress: None,
        }
    }

    /// `texturing` tells whether the preview is still marked in the store.
    fn lines(&mut self, event: &TaskEvent, texturing: bool) -> Vec<String> {
        match event {
            TaskEvent::Updated(snapshot) if snapshot.id == self.task_id => {
                let mut line = format!(
                    "{} {} {}%",
                    snapshot.status.icon(),
                    snapshot.status.label(),
                    snapshot.progress_percent()
                );
                if let (true, Some(preview)) = (texturing, &self.preview_task_id) {
                    line.push_str(&format!(" (texturing {preview})"));
                }

                let mut lines = vec![line];
                if !self.thumbnail_shown {
                    if let Some(url) = snapshot.thumbnail() {
                        self.thumbnail_shown = true;
                        lines.push(format!("thumbnail: {url}"));
                    }
                }
                lines
            }
            TaskEvent::Finished { task_id, status } if *task_id == self.task_id => {
                vec![format!("{} {task_id} finished: {}", status.icon(), status.label())]
            }
            TaskEvent::Refreshed { total, in_progress } if self.in_progress != Some(*in_progress) => {
                self.in_progress = Some(*in_progress);
                vec![format!("{in_progress} of {total} tasks in progress")]
            }
            _ => Vec::new(),
        }
    }
}

/// Model, thumbnail and texture URLs of a finished task.
fn result_lines(task: &TaskSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    let formats = task.model_urls.as_ref().map(|u| u.available()).unwrap_or_default();
    for format in formats {
        if let Some(url) = task.model_url(format) {
            lines.push(format!("{}: {url}", format.extension()));
        }
    }
    if let Some(url) = task.thumbnail() {
        lines.push(format!("thumbnail: {url}"));
    }
    for (set, textures) in task.texture_urls.iter().flatten().enumerate() {
        for (map, url) in textures.available() {
            lines.push(format!("texture {set} {map}: {url}"));
        }
    }
    lines
}

/// File extension of a texture URL's last path segment, `png` when there is none.
fn texture_extension(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            let name = u.path_segments()?.next_back()?.to_string();
            let (_, ext) = name.rsplit_once('.')?;
            (!ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .then(|| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| "png".to_string())
}

fn print_section<'a>(title: &str, tasks: impl Iterator<Item = &'a TaskSnapshot>) {
    let tasks: Vec<_> = tasks.collect();
    if tasks.is_empty() {
        return;
    }
    println!("{title}:");
    for task in tasks {
        print_row(task);
    }
}

fn print_row(task: &TaskSnapshot) {
    let created = DateTime::from_timestamp_millis(task.created_at)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let mode = task.mode.map(|m| m.id().to_string()).unwrap_or_default();
    println!(
        "{:<28} {:<8} {} {:<12} {:>3}%  {}  {}",
        task.id,
        mode,
        task.status.icon(),
        task.status.label(),
        task.progress_percent(),
        created,
        task.prompt
    );
}
