//! Lablight daemon entry point.
//!
//! Stdout carries the newline-delimited JSON chat wire, so every log
//! line goes to stderr.

use anyhow::Context;
use clap::Parser;
use lablight::calendar::CalendarScheduler;
use lablight::commands::{CommandResponder, ResponderSettings};
use lablight::config::StatusConfig;
use lablight::effects::SideEffects;
use lablight::hardware::{DoorSensor, GpioDoorSensor, GpioIndicatorPanel, IndicatorPanel, SysfsGpio};
use lablight::sign::{LogDisplay, SignQueue};
use lablight::status::{ReconcilerSettings, StatusReconciler};
use lablight::targets::chat::run_stdio_wire;
use lablight::targets::{MattermostTarget, TargetSet, chat_pair};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lablight", version, about = "Hackerspace status beacon")]
struct Args {
    /// Config file path (default: ~/.config/lablight/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<StatusConfig> {
    match &args.config {
        Some(path) => {
            StatusConfig::from_file(path).with_context(|| format!("load {}", path.display()))
        }
        None => {
            let path = StatusConfig::default_config_path();
            if path.exists() {
                StatusConfig::from_file(&path).with_context(|| format!("load {}", path.display()))
            } else {
                info!(path = %path.display(), "no config file, using defaults");
                Ok(StatusConfig::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(1))
        .timeout(Duration::from_secs(10))
        .build()
        .context("build http client")?;

    // Hardware comes first: a daemon that cannot see the door has no
    // status to report, so failing here aborts startup.
    let gpio = Arc::new(SysfsGpio::new());
    let sensor: Arc<dyn DoorSensor> = Arc::new(
        GpioDoorSensor::new(Arc::clone(&gpio), &config.sensor).context("door sensor setup")?,
    );
    let panel: Arc<dyn IndicatorPanel> = Arc::new(
        GpioIndicatorPanel::new(Arc::clone(&gpio), &config.indicators)
            .context("indicator panel setup")?,
    );

    let (chat_target, wire) = chat_pair(&config.chat.channel);
    let chat_sender = chat_target.sender();
    let mut targets = TargetSet::new(vec![Box::new(chat_target)]);
    if let Some(mattermost) = &config.mattermost {
        targets.push(Box::new(MattermostTarget::new(client.clone(), mattermost)));
        info!(channel_id = %mattermost.channel_id, "mattermost target enabled");
    }

    let (mut scheduler, notifications) = CalendarScheduler::spawn(client.clone(), &config.calendar);
    let effects = SideEffects::new(client.clone(), config.effects.clone());

    let mut sign_queue = config
        .sign
        .as_ref()
        .map(|sign| SignQueue::spawn(sign, Box::new(LogDisplay)));
    let sign_sender = sign_queue.as_ref().and_then(SignQueue::sender);

    let (reconciler, door_state) = StatusReconciler::new(
        targets,
        Arc::clone(&sensor),
        panel,
        effects,
        notifications,
        ReconcilerSettings {
            announce: config.chat.announce_transitions,
            poll_interval: config.sensor.poll_interval(),
            status_pin: config.indicators.status_pin,
            entrance_pin: config.indicators.entrance_pin,
        },
    )
    .spawn();

    let (inbound_tx, inbound_rx) = mpsc::channel(16);
    let responder_cancel = CancellationToken::new();
    let responder = CommandResponder::new(
        inbound_rx,
        chat_sender,
        sensor,
        door_state,
        sign_sender,
        ResponderSettings {
            home_channel: config.chat.channel.clone(),
            bot_name: config.chat.bot_name.clone(),
        },
    )
    .spawn(responder_cancel.clone());

    info!(channel = %config.chat.channel, "lablight running");

    let wire_cancel = CancellationToken::new();
    let mut wire_task = tokio::spawn(run_stdio_wire(wire, inbound_tx, wire_cancel.clone()));

    let wire_result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            wire_cancel.cancel();
            (&mut wire_task).await
        }
        result = &mut wire_task => {
            info!("chat wire ended, shutting down");
            result
        }
    };
    match wire_result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "chat wire failed"),
        Err(err) => warn!(error = %err, "chat wire task failed"),
    }

    // Wind down from the outside in: no new commands, then no new
    // status writes, then no new calendar notifications, and finally
    // let the sign finish its backlog.
    responder_cancel.cancel();
    if let Err(err) = responder.await {
        warn!(error = %err, "command responder task failed");
    }
    reconciler.stop().await;
    scheduler.close().await;
    if let Some(queue) = sign_queue.as_mut() {
        queue.close().await;
    }

    info!("lablight stopped");
    Ok(())
}
