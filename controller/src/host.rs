use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::Mutex, task::JoinHandle};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use pool_common::{
    cell_bridge_on, ControllerConfig, PinRole, PoolEngine, PoolMode, Settings, HOURS_PER_DAY,
};

use crate::{
    hw::{self, OutputDriver},
    store::SettingsStore,
};

/// The one logical unit of shared mutable state: the settings-owning engine
/// plus the last commanded output flags. Guarded by a single mutex; every
/// handler and periodic tick takes it for the duration of its
/// read/mutate/compute step only.
struct Shared {
    engine: PoolEngine,
    pump_on: bool,
    cell_on: bool,
    heartbeat_on: bool,
}

#[derive(Clone)]
struct AppState {
    shared: Arc<Mutex<Shared>>,
    driver: Arc<dyn OutputDriver>,
    store: SettingsStore,
    config: ControllerConfig,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct ModeForm {
    mode: String,
}

#[derive(Debug, Deserialize)]
struct ManualForm {
    state: String,
}

#[derive(Debug, Deserialize)]
struct PwmRequest {
    duty: i64,
}

#[derive(Debug, Serialize)]
struct PwmResponse {
    pwm_duty: u8,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ControllerConfig::default();
    let store = SettingsStore::new();
    let settings = store.load().await;

    let driver = hw::select_driver(&config);
    let engine = PoolEngine::new(config.clone(), settings);

    let state = AppState {
        shared: Arc::new(Mutex::new(Shared {
            engine,
            pump_on: false,
            cell_on: false,
            heartbeat_on: false,
        })),
        driver,
        store,
        config: config.clone(),
    };

    // Restore the persisted PWM duty and apply the loaded mode once so the
    // relays match logical state before the first tick or request.
    {
        let mut guard = state.shared.lock().await;
        let Shared {
            engine, pump_on, ..
        } = &mut *guard;
        apply_pwm(state.driver.as_ref(), engine.settings().pwm_duty);
        let now = engine.local_now();
        let desired = engine.desired_pump_state(now);
        command_pump(state.driver.as_ref(), pump_on, desired);
    }

    let scheduler = spawn_scheduler_loop(state.clone());
    let cell = spawn_cell_loop(state.clone());
    let heartbeat = spawn_heartbeat_loop(state.clone());

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = Router::new()
        .route("/status", get(handle_status))
        .route("/set", post(handle_set_mode))
        .route("/manual", post(handle_manual))
        .route("/save_schedule", post(handle_save_schedule))
        .route("/pwm", post(handle_pwm))
        .route("/set_dst", post(handle_set_dst))
        .fallback_service(ServeDir::new(web_root))
        .with_state(state);

    let port = std::env::var("POOL_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.http_port);
    let addr: SocketAddr = format!("0.0.0.0:{port}")
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!(
        "pool controller v{} listening on http://{addr}",
        env!("CARGO_PKG_VERSION")
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Periodic loops run for process lifetime; stop them once the server
    // has drained.
    scheduler.abort();
    cell.abort();
    heartbeat.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        return;
    }
    info!("shutdown requested");
}

/// 10 s loop: expire timed modes, then re-apply the active mode to the pump
/// relay. Needed even though every mutation applies synchronously, because
/// mode can change purely by clock (expiry, schedule hour rollover).
fn spawn_scheduler_loop(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(state.config.scheduler_tick_secs));
        loop {
            interval.tick().await;
            if let Err(err) = scheduler_tick(&state).await {
                warn!("scheduler tick failed: {err:#}");
                tokio::time::sleep(Duration::from_secs(state.config.tick_error_backoff_secs))
                    .await;
            }
        }
    })
}

async fn scheduler_tick(state: &AppState) -> anyhow::Result<()> {
    let snapshot = {
        let mut guard = state.shared.lock().await;
        let Shared {
            engine, pump_on, ..
        } = &mut *guard;

        let now = engine.local_now();
        let expired = engine.check_boost_expiry(now) | engine.check_manual_expiry(now);
        let desired = engine.desired_pump_state(now);
        command_pump(state.driver.as_ref(), pump_on, desired);

        expired.then(|| engine.settings().clone())
    };

    if let Some(settings) = snapshot {
        info!("timed mode expired, back to auto");
        state.store.save(&settings).await?;
    }
    Ok(())
}

/// 1 s loop deriving the cell-bridge relays from pump state and absolute
/// time. Writes are edge-triggered; skipping redundant writes is an
/// optimization, not a correctness requirement.
fn spawn_cell_loop(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(state.config.cell_tick_secs));
        let mut last: Option<bool> = None;
        loop {
            interval.tick().await;
            let mut guard = state.shared.lock().await;
            let Shared {
                pump_on, cell_on, ..
            } = &mut *guard;

            let desired = cell_bridge_on(*pump_on, Utc::now().timestamp());
            if last != Some(desired) {
                command_cell(state.driver.as_ref(), cell_on, desired);
                last = Some(desired);
            }
        }
    })
}

fn spawn_heartbeat_loop(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let half_period = Duration::from_millis(state.config.heartbeat_half_period_ms);
        let mut on = false;
        loop {
            on = !on;
            {
                let mut guard = state.shared.lock().await;
                guard.heartbeat_on = on;
            }
            if let Err(err) = state.driver.set_digital(PinRole::Heartbeat, on) {
                warn!("heartbeat write failed: {err:#}");
            }
            tokio::time::sleep(half_period).await;
        }
    })
}

async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let (report, snapshot) = {
        let mut guard = state.shared.lock().await;
        let Shared {
            engine,
            pump_on,
            cell_on,
            heartbeat_on,
        } = &mut *guard;

        let now = engine.local_now();
        let (mut report, expired) = engine.status(now, *pump_on, *cell_on, *heartbeat_on);
        if expired {
            // Status polling is a valid expiry path; converge the relay
            // exactly as the scheduler tick would.
            let desired = engine.desired_pump_state(now);
            command_pump(state.driver.as_ref(), pump_on, desired);
            report.pump_on = desired;
        }
        (report, expired.then(|| engine.settings().clone()))
    };

    if let Some(settings) = snapshot {
        info!("timed mode expired via status poll, back to auto");
        persist(&state, &settings).await;
    }
    Json(report)
}

async fn handle_set_mode(State(state): State<AppState>, Form(form): Form<ModeForm>) -> Response {
    let mode: PoolMode = match form.mode.parse() {
        Ok(mode) => mode,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let snapshot = {
        let mut guard = state.shared.lock().await;
        let Shared {
            engine, pump_on, ..
        } = &mut *guard;

        let now = engine.local_now();
        engine.set_mode(mode, now);
        let desired = engine.desired_pump_state(now);
        command_pump(state.driver.as_ref(), pump_on, desired);
        engine.settings().clone()
    };

    persist(&state, &snapshot).await;
    Redirect::to("/").into_response()
}

async fn handle_manual(State(state): State<AppState>, Form(form): Form<ManualForm>) -> Response {
    let on = match form.state.as_str() {
        "on" => true,
        "off" => false,
        _ => return error_response(StatusCode::BAD_REQUEST, "state must be 'on' or 'off'"),
    };

    let snapshot = {
        let mut guard = state.shared.lock().await;
        let Shared {
            engine, pump_on, ..
        } = &mut *guard;

        let now = engine.local_now();
        engine.set_manual(on, now);
        let desired = engine.desired_pump_state(now);
        command_pump(state.driver.as_ref(), pump_on, desired);
        engine.settings().clone()
    };

    persist(&state, &snapshot).await;
    Redirect::to("/").into_response()
}

async fn handle_save_schedule(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    // Checkbox semantics: presence of h0..h23 marks the hour on.
    let mut hours = [false; HOURS_PER_DAY];
    for (hour, slot) in hours.iter_mut().enumerate() {
        *slot = fields.contains_key(&format!("h{hour}"));
    }

    let snapshot = {
        let mut guard = state.shared.lock().await;
        guard.engine.save_schedule(hours);
        guard.engine.settings().clone()
    };

    // No immediate pump write; the next scheduler tick applies it if the
    // controller is in auto mode.
    persist(&state, &snapshot).await;
    Redirect::to("/").into_response()
}

async fn handle_pwm(State(state): State<AppState>, Json(request): Json<PwmRequest>) -> Response {
    let (duty, snapshot) = {
        let mut guard = state.shared.lock().await;
        let duty = guard.engine.set_pwm_duty(request.duty);
        (duty, guard.engine.settings().clone())
    };

    apply_pwm(state.driver.as_ref(), duty);
    persist(&state, &snapshot).await;
    Json(PwmResponse { pwm_duty: duty }).into_response()
}

async fn handle_set_dst(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let enabled = fields.contains_key("dst");

    let snapshot = {
        let mut guard = state.shared.lock().await;
        guard.engine.set_dst(enabled);
        guard.engine.settings().clone()
    };

    persist(&state, &snapshot).await;
    Redirect::to("/").into_response()
}

/// The web layer reflects logical state even when persistence or a relay
/// write fails; failures are logged, never surfaced as request errors.
async fn persist(state: &AppState, settings: &Settings) {
    if let Err(err) = state.store.save(settings).await {
        warn!("failed to persist settings: {err:#}");
    }
}

fn command_pump(driver: &dyn OutputDriver, flag: &mut bool, on: bool) {
    *flag = on;
    if let Err(err) = driver.set_digital(PinRole::Pump, on) {
        warn!("pump relay write failed: {err:#}");
    }
}

fn command_cell(driver: &dyn OutputDriver, flag: &mut bool, on: bool) {
    *flag = on;
    for role in [PinRole::CellBridge1, PinRole::CellBridge2] {
        if let Err(err) = driver.set_digital(role, on) {
            warn!("cell bridge relay write failed: {err:#}");
        }
    }
}

fn apply_pwm(driver: &dyn OutputDriver, duty: u8) {
    if let Err(err) = driver.set_pwm(duty) {
        warn!("pwm write failed: {err:#}");
    }
    // The mirror pin tracks whether any duty is applied at all.
    if let Err(err) = driver.set_digital(PinRole::PwmMirror, duty > 0) {
        warn!("pwm mirror write failed: {err:#}");
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
