use std::time::Duration;

use chrono::{DateTime, Local};
use log::{error, info};
use tokio::sync::{mpsc, watch};

use crate::api::thingspeak::ThingSpeakClient;
use crate::config::Settings;
use crate::error::SensorWatchError;
use crate::model::SampleWindow;

#[derive(Debug, PartialEq, Eq)]
pub enum PollerCommand {
    RefreshNow,
    Shutdown,
}

/// Outcome of one fetch, delivered to the dashboard. A failed fetch is not
/// fatal: it becomes an empty window plus a user-visible error string, and
/// the next tick gets another attempt.
#[derive(Debug, Clone)]
pub struct PollUpdate {
    pub window: SampleWindow,
    pub error: Option<String>,
    pub fetched_at: DateTime<Local>,
}

impl PollUpdate {
    pub fn from_result(result: Result<SampleWindow, SensorWatchError>) -> Self {
        match result {
            Ok(window) => Self {
                window,
                error: None,
                fetched_at: Local::now(),
            },
            Err(e) => Self {
                window: SampleWindow::default(),
                error: Some(e.to_string()),
                fetched_at: Local::now(),
            },
        }
    }
}

/// Refresh loop. Re-reads the live settings on every iteration, so interval
/// and auto-refresh changes take effect on the next tick, and exits on
/// `Shutdown` or when either channel closes.
pub async fn run(
    client: ThingSpeakClient,
    mut settings_rx: watch::Receiver<Settings>,
    mut cmd_rx: mpsc::Receiver<PollerCommand>,
    update_tx: mpsc::Sender<PollUpdate>,
) {
    // Fetch once up front so the dashboard is not blank until the first
    // tick. Manual mode idles until the first explicit trigger instead.
    if settings_rx.borrow().auto_refresh && poll_once(&client, &update_tx).await.is_err() {
        return;
    }

    loop {
        let settings = *settings_rx.borrow();

        let tick = async {
            if settings.auto_refresh {
                tokio::time::sleep(Duration::from_secs(settings.interval_secs)).await;
            } else {
                // Manual mode: idle until a command arrives.
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(PollerCommand::RefreshNow) => {
                    if poll_once(&client, &update_tx).await.is_err() {
                        break;
                    }
                }
                Some(PollerCommand::Shutdown) | None => break,
            },
            _ = tick => {
                if poll_once(&client, &update_tx).await.is_err() {
                    break;
                }
            }
            changed = settings_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // Loop around and wait again with the fresh settings.
            }
        }
    }

    info!("Poller stopped");
}

async fn poll_once(
    client: &ThingSpeakClient,
    update_tx: &mpsc::Sender<PollUpdate>,
) -> Result<(), ()> {
    let update = PollUpdate::from_result(client.fetch_window().await);
    if let Some(err) = &update.error {
        error!("Fetch failed: {}", err);
    }
    update_tx.send(update).await.map_err(|_| ())
}
