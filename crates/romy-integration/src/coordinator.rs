//! Polling coordinator
//!
//! One coordinator per set-up robot. It owns the robot handle, fetches the
//! robot's status every update interval and publishes the latest snapshot
//! to every entity through a watch channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use romy_client::{ClientError, Robot, RobotConnection, RobotStatus};
use romy_core::Context;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// A status refresh did not produce data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpdateFailed {
    #[error("error communicating with robot: {0}")]
    Robot(#[from] ClientError),
}

/// Keeps the status of one robot fresh
pub struct RomyCoordinator {
    robot: Arc<dyn Robot>,
    /// Identity captured when the robot was connected
    connection: RobotConnection,
    update_interval: Duration,
    data_tx: watch::Sender<Option<RobotStatus>>,
    /// Context of the most recent refresh
    context_tx: watch::Sender<Context>,
    last_update_success: AtomicBool,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl RomyCoordinator {
    pub fn new(robot: Arc<dyn Robot>, update_interval: Duration) -> Self {
        let (data_tx, _) = watch::channel(None);
        let (context_tx, _) = watch::channel(Context::new());
        let (shutdown_tx, _) = broadcast::channel(1);
        let connection = robot.connection();

        Self {
            robot,
            connection,
            update_interval,
            data_tx,
            context_tx,
            last_update_success: AtomicBool::new(true),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn robot(&self) -> &Arc<dyn Robot> {
        &self.robot
    }

    pub fn connection(&self) -> &RobotConnection {
        &self.connection
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Latest status, `None` until the first successful refresh
    pub fn data(&self) -> Option<RobotStatus> {
        self.data_tx.borrow().clone()
    }

    /// Receive every new status as it is published
    pub fn subscribe(&self) -> watch::Receiver<Option<RobotStatus>> {
        self.data_tx.subscribe()
    }

    /// Context shared by every state projected from the most recent refresh
    pub fn context(&self) -> Context {
        self.context_tx.borrow().clone()
    }

    /// Whether the most recent refresh succeeded
    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    /// Fetch the robot's status once
    ///
    /// A failed refresh keeps the previous data but marks the coordinator
    /// unsuccessful until the next refresh succeeds.
    #[instrument(skip(self), fields(host = %self.connection.host))]
    pub async fn refresh(&self) -> Result<(), UpdateFailed> {
        let result = self.robot.update().await;
        self.context_tx.send_replace(Context::new());
        match result {
            Ok(status) => {
                if !self.last_update_success.swap(true, Ordering::SeqCst) {
                    info!("Fetching {} data recovered", self.connection.user_name);
                }
                debug!("Received status update");
                self.data_tx.send_replace(Some(status));
                Ok(())
            }
            Err(e) => {
                if self.last_update_success.swap(false, Ordering::SeqCst) {
                    warn!("Error fetching {} data: {}", self.connection.user_name, e);
                }
                Err(UpdateFailed::Robot(e))
            }
        }
    }

    /// Refresh before entities are created; failure means the robot is not
    /// ready to be set up
    pub async fn first_refresh(&self) -> Result<RobotStatus, UpdateFailed> {
        self.refresh().await?;
        // A successful refresh always publishes data
        Ok(self.data().unwrap_or_default())
    }

    /// Start periodic refreshing
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Coordinator for {} already running", self.connection.host);
            return;
        }

        info!(
            "Polling {} every {:?}",
            self.connection.host, self.update_interval
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let coordinator = Arc::clone(self);
        let running = self.running.clone();

        tokio::spawn(async move {
            let period = coordinator.update_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Failures are logged by refresh and surface as unavailability
                        let _ = coordinator.refresh().await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Received shutdown signal");
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("Stopped polling {}", coordinator.connection.host);
        });
    }

    /// Stop periodic refreshing
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        debug!("Stopping coordinator for {}", self.connection.host);
        let _ = self.shutdown_tx.send(());
    }

    /// Check if periodic refreshing is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use romy_client::mock::{MockDeviceClient, MockRobot};
    use romy_client::DeviceClient;

    async fn coordinator_for(client: &MockDeviceClient, interval: Duration) -> Arc<RomyCoordinator> {
        let robot = client.connect("10.0.0.5", "").await;
        Arc::new(RomyCoordinator::new(robot, interval))
    }

    #[tokio::test]
    async fn test_first_refresh_publishes_status() {
        let client = MockDeviceClient::new();
        client.add_robot(
            "10.0.0.5",
            MockRobot::new("romy-1", "Kitchen").with_status(
                RobotStatus::default().with_sensor("battery_level", 90),
            ),
        );
        let coordinator = coordinator_for(&client, Duration::from_secs(5)).await;
        assert!(coordinator.data().is_none());

        let status = coordinator.first_refresh().await.unwrap();

        assert_eq!(status.sensors.get("battery_level"), Some(&90));
        assert_eq!(coordinator.data(), Some(status));
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_data() {
        let client = MockDeviceClient::new();
        let robot = client.add_robot(
            "10.0.0.5",
            MockRobot::new("romy-1", "Kitchen").with_status(RobotStatus::default().with_mode("docked")),
        );
        let coordinator = coordinator_for(&client, Duration::from_secs(5)).await;
        coordinator.refresh().await.unwrap();

        robot.set_fail_updates(true);
        let result = coordinator.refresh().await;

        assert!(matches!(
            result,
            Err(UpdateFailed::Robot(ClientError::Unreachable { .. }))
        ));
        assert!(!coordinator.last_update_success());
        assert_eq!(coordinator.data().and_then(|s| s.mode), Some("docked".to_string()));
        let failed_context = coordinator.context();

        robot.set_fail_updates(false);
        coordinator.refresh().await.unwrap();
        assert!(coordinator.last_update_success());
        assert_ne!(coordinator.context(), failed_context);
    }

    #[tokio::test]
    async fn test_first_refresh_fails_for_unreachable_robot() {
        let client = MockDeviceClient::new();
        let coordinator = coordinator_for(&client, Duration::from_secs(5)).await;

        assert!(coordinator.first_refresh().await.is_err());
        assert!(coordinator.data().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_until_stopped() {
        let client = MockDeviceClient::new();
        let robot = client.add_robot(
            "10.0.0.5",
            MockRobot::new("romy-1", "Kitchen").with_status(RobotStatus::default().with_mode("docked")),
        );
        let coordinator = coordinator_for(&client, Duration::from_secs(5)).await;
        let mut updates = coordinator.subscribe();

        coordinator.start();
        assert!(coordinator.is_running());

        robot.set_status(RobotStatus::default().with_mode("cleaning"));
        updates.changed().await.unwrap();
        assert_eq!(
            updates.borrow().as_ref().and_then(|s| s.mode.clone()),
            Some("cleaning".to_string())
        );

        coordinator.stop();
        for _ in 0..10 {
            if !coordinator.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!coordinator.is_running());
    }
}
