//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that wires the relay to
//! the console, starts it, waits for a shutdown signal and stops it.

use crate::{
    config::AppConfig,
    console::{run_console, ConsoleEvent},
    logging::display_banner,
    signals::{setup_signal_handlers, spawn_forced_exit_handler},
};
use relay_server::RelayServer;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The inspector application.
///
/// # Architecture
///
/// * **Relay**: a [`RelayServer`] configured from the app config
/// * **Console**: a task printing commands and the client list, fed by the
///   relay callbacks over a channel
/// * **Shutdown**: the first signal stops the relay gracefully, a second
///   one exits immediately
pub struct Application {
    /// Validated application configuration
    config: AppConfig,
    /// Relay server instance
    server: RelayServer,
    /// Console input, taken when the console task starts
    console_events: Mutex<Option<mpsc::UnboundedReceiver<ConsoleEvent>>>,
    /// Used to tell the console the relay has stopped
    console_sender: mpsc::UnboundedSender<ConsoleEvent>,
    /// Running console task
    console_task: Mutex<Option<JoinHandle<usize>>>,
}

impl Application {
    /// Creates the application from a validated configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration already merged with CLI overrides
    ///
    /// # Returns
    ///
    /// A configured `Application` ready to run, or an error if the relay
    /// rejected the resulting options.
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let (events, console_events) = mpsc::unbounded_channel();

        let on_command = events.clone();
        let on_connect = events.clone();
        let on_disconnect = events.clone();
        let options = config
            .to_server_options()
            .on_command(move |command| {
                let _ = on_command.send(ConsoleEvent::Command(command.clone()));
            })
            .on_connect(move |client| {
                let _ = on_connect.send(ConsoleEvent::Connected(client.clone()));
            })
            .on_disconnect(move |client| {
                let _ = on_disconnect.send(ConsoleEvent::Disconnected(client.clone()));
            })
            .on_start(|| info!("✅ Inspector relay is now accepting clients"))
            .on_stop(|| info!("✅ Inspector relay stopped"));

        let server = RelayServer::new();
        server.configure(options)?;

        Ok(Self {
            config,
            server,
            console_events: Mutex::new(Some(console_events)),
            console_sender: events,
            console_task: Mutex::new(None),
        })
    }

    /// The relay this application drives.
    pub fn server(&self) -> &RelayServer {
        &self.server
    }

    /// Starts the console task and the relay.
    ///
    /// # Returns
    ///
    /// The address the relay is listening on.
    pub async fn start(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        let receiver = self.console_events.lock().ok().and_then(|mut slot| slot.take());
        if let Some(receiver) = receiver {
            let handle = tokio::spawn(run_console(
                self.server.clone(),
                receiver,
                self.config.history.echo_commands,
            ));
            if let Ok(mut slot) = self.console_task.lock() {
                *slot = Some(handle);
            }
        }

        let addr = self.server.start().await?;
        Ok(addr)
    }

    /// Stops the relay, then waits for the console to print everything the
    /// relay reported, final disconnects included.
    ///
    /// # Returns
    ///
    /// The number of events the console printed over its lifetime.
    pub async fn shutdown(&self) -> usize {
        self.server.stop().await;

        // `stop` has fired every callback by now, so this lands last
        let _ = self.console_sender.send(ConsoleEvent::Stopped);
        let handle = self.console_task.lock().ok().and_then(|mut slot| slot.take());
        match handle {
            Some(handle) => match handle.await {
                Ok(printed) => printed,
                Err(e) => {
                    warn!("Console task ended abnormally: {}", e);
                    0
                }
            },
            None => 0,
        }
    }

    /// Runs the application until a shutdown signal arrives.
    ///
    /// # Returns
    ///
    /// `Ok(())` after a graceful shutdown, or an error if the relay could
    /// not start or the signal handlers could not be installed.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        display_banner();
        self.log_configuration_summary();

        let addr = self.start().await?;
        info!("🎯 Ready for clients on ws://{}", addr);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        setup_signal_handlers().await?;
        spawn_forced_exit_handler();

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        let printed = self.shutdown().await;
        debug!("Console printed {} event(s)", printed);

        let relayed = self.server.history().len();
        if relayed == 0 {
            warn!("📊 No commands were received this session");
        } else {
            info!("📊 Final Statistics: {} command(s) relayed", relayed);
        }
        info!("👋 Inspector shutdown complete");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Listen address: {}:{}", self.config.server.host, self.config.server.port);
        info!("  📦 Outbound queue per client: {}", self.config.server.outbound_queue);
        info!("  📨 Echo commands: {}", self.config.history.echo_commands);
    }
}
