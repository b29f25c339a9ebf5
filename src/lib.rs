//! MIE Shorts - Record short multi-segment clips, made simple.
//!
//! This is the main library crate for the MIE Shorts application. The
//! capture session core builds on its own; the Tauri application and the
//! native camera/encoder adapters sit behind the `desktop` feature.

pub mod capture;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod recorder;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mie_shorts=debug,tauri=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Session config from the app config dir, then the environment
#[cfg(feature = "desktop")]
fn load_session_config(app: &tauri::App) -> anyhow::Result<recorder::SessionConfig> {
    use anyhow::Context;
    use tauri::Manager;

    let path = app
        .path()
        .app_config_dir()
        .context("Failed to resolve app config dir")?
        .join("session.json");
    let config = recorder::SessionConfig::load(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?
        .with_env_overrides()
        .context("Invalid session config override")?;
    Ok(config)
}

/// Initialize the application
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::session::SessionState;
    use tauri::{Emitter, Manager};
    use tokio::sync::broadcast::error::RecvError;

    init_tracing();

    tracing::info!("Starting MIE Shorts v{}", env!("CARGO_PKG_VERSION"));

    let app = tauri::Builder::default()
        .setup(|app| {
            let config = load_session_config(app)?;
            let state = SessionState::native(config);
            tracing::info!("Capture session {}", state.manager.session_id());

            // Forward session events to the webview
            let mut events = state.manager.subscribe();
            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            if let Err(e) = handle.emit("session-event", &event) {
                                tracing::warn!("Failed to emit session event: {}", e);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("Session event forwarder lagged by {}", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // System commands
            commands::system::get_platform,
            commands::system::check_and_request_permissions,
            commands::system::get_system_info,
            // Session commands
            commands::session::get_cameras,
            commands::session::initialize_camera,
            commands::session::retry_camera,
            commands::session::flip_camera,
            commands::session::start_recording,
            commands::session::stop_recording,
            commands::session::delete_segment,
            commands::session::enter_preview,
            commands::session::exit_preview,
            commands::session::preview_current,
            commands::session::preview_current_data,
            commands::session::advance_preview,
            commands::session::set_visibility,
            commands::session::get_session_view,
            commands::session::get_session_snapshot,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|handle, event| {
        if let tauri::RunEvent::Exit = event {
            if let Some(state) = handle.try_state::<SessionState>() {
                tauri::async_runtime::block_on(state.manager.shutdown());
            }
        }
    });
}
