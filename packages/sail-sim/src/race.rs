//! race.rs — Live race: tick loop, telemetry broadcast, WebSocket control
//!
//! Boat 0 belongs to the human at the control panel; boats 1..N are flown by
//! the loaded policies. A renderer connects to `/ws`, receives one telemetry
//! frame per tick and sends commands back:
//!   { "cmd": "sail",   "args": { "step": 1 } }      nudge by π/60 per step
//!   { "cmd": "rudder", "args": { "angle": -0.3 } }  set absolute (radians)
//!   { "cmd": "pause" } / { "cmd": "resume" } / { "cmd": "reset" }
//!   { "cmd": "set_speed", "args": { "speed": 2.0 } }
//!   { "cmd": "preset", "args": { "name": "strong_breeze" } }

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use rand::rngs::StdRng;
use sail_types::{BoatTelemetry, TelemetryFrame, Vec2};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use sail_sim::controller::Controller;
use sail_sim::scenarios::Preset;
use sail_sim::{Boat, EnvConfig, Environment, HullParams, LinearPolicy, Result, SimError};

/// Control step per key press, same as one frame of a held key
const CONTROL_STEP: f64 = PI / 60.0;
/// Ocean texture grid cell in world units (50 px at 35 px per unit)
const OCEAN_CELL: f64 = 50.0 / 35.0;

pub const USER_BOAT: usize = 0;

// ── Race state ────────────────────────────────────────────────────────────────

pub struct RaceState {
    pub env: Environment,
    env_cfg: EnvConfig,
    hull: HullParams,
    /// `pilots[i]` flies boat `i + 1`
    pilots: Vec<LinearPolicy>,
    names: Vec<String>,
    rng: StdRng,
    pub paused: bool,
    pub epoch: u64,
    pub speed: f64,
    pub last_frame: Option<String>,
}

pub type SharedState = Arc<RwLock<RaceState>>;

impl RaceState {
    pub fn new(
        env_cfg: EnvConfig,
        hull: HullParams,
        pilots: Vec<(String, LinearPolicy)>,
        mut rng: StdRng,
        speed: f64,
    ) -> Result<Self> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(SimError::InvalidSimulation(format!("race speed must be positive, got {speed}")));
        }
        let env = fresh_env(&env_cfg, &hull, pilots.len() + 1, &mut rng)?;
        let mut names = vec!["user".to_string()];
        let mut policies = Vec::with_capacity(pilots.len());
        for (name, policy) in pilots {
            names.push(name);
            policies.push(policy);
        }
        Ok(Self {
            env,
            env_cfg,
            hull,
            pilots: policies,
            names,
            rng,
            paused: false,
            epoch: 0,
            speed,
            last_frame: None,
        })
    }

    /// Let every policy pick its controls, then advance the world
    pub fn tick(&mut self, dt: f64) {
        let inputs = self.env.inputs();
        for (i, pilot) in self.pilots.iter_mut().enumerate() {
            let boat_idx = i + 1;
            if let (Some(obs), Some(boat)) = (inputs.get(boat_idx), self.env.boat_mut(boat_idx)) {
                pilot.act(obs).apply(boat);
            }
        }
        self.env.step(dt);
        self.env.ocean_offset = wrap_ocean(self.env.ocean_offset);
        self.epoch += 1;
    }

    /// New track, new boats, progress back to zero
    pub fn reset(&mut self) -> Result<()> {
        self.env = fresh_env(&self.env_cfg, &self.hull, self.names.len(), &mut self.rng)?;
        Ok(())
    }

    pub fn set_preset(&mut self, preset: Preset) {
        self.env_cfg = preset.apply(&self.env_cfg);
        self.env.wind = self.env_cfg.wind;
    }

    pub fn frame(&self) -> TelemetryFrame {
        let fitnesses = self.env.fitnesses();
        let boats = self
            .env
            .boats()
            .iter()
            .zip(&self.names)
            .zip(fitnesses)
            .enumerate()
            .map(|(index, ((b, name), fitness))| BoatTelemetry {
                index,
                name: name.clone(),
                pos: b.pos,
                heading_rad: b.rot,
                sail_angle_rad: b.sail_angle,
                rudder_angle_rad: b.rudder_angle,
                speed: b.vel.len(),
                target_waypoint: b.progress.target,
                waypoints_reached: b.progress.reached,
                fitness,
            })
            .collect();
        TelemetryFrame {
            kind: "telemetry".into(),
            epoch: self.epoch,
            paused: self.paused,
            wind: self.env.wind,
            ocean_offset: self.env.ocean_offset,
            hit_distance: self.env.hit_distance,
            track: self.env.track().points().to_vec(),
            boats,
        }
    }

    fn user_boat(&mut self) -> Option<&mut Boat> {
        self.env.boat_mut(USER_BOAT)
    }
}

fn fresh_env(cfg: &EnvConfig, hull: &HullParams, n_boats: usize, rng: &mut StdRng) -> Result<Environment> {
    let boats = (0..n_boats).map(|_| Boat::new(*hull)).collect::<Result<Vec<_>>>()?;
    Environment::with_random_track(cfg, rng, boats)
}

/// Keep the scroll offset within one texture cell
fn wrap_ocean(offset: Vec2) -> Vec2 {
    Vec2::new(offset.x % OCEAN_CELL, offset.y % OCEAN_CELL)
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub enum CommandOutcome {
    Applied,
    Ignored(String),
}

/// Apply one control-panel command. Commands are JSON:
/// `{ "cmd": "...", "args": {...} }`
pub fn apply_command(state: &mut RaceState, v: &Value) -> CommandOutcome {
    let cmd = v["cmd"].as_str().unwrap_or("");
    let args = &v["args"];
    match cmd {
        "sail" | "rudder" => {
            let Some(boat) = state.user_boat() else {
                return CommandOutcome::Ignored("no user boat".into());
            };
            let current = if cmd == "sail" { boat.sail_angle } else { boat.rudder_angle };
            let target = if let Some(angle) = args["angle"].as_f64() {
                angle
            } else if let Some(step) = args["step"].as_f64() {
                current + step * CONTROL_STEP
            } else {
                return CommandOutcome::Ignored(format!("{cmd} needs `angle` or `step`"));
            };
            if cmd == "sail" {
                boat.set_controls(target, boat.rudder_angle);
            } else {
                boat.set_controls(boat.sail_angle, target);
            }
        }
        "pause" => {
            state.paused = true;
            info!("⏸ Race paused");
        }
        "resume" => {
            state.paused = false;
            info!("▶ Race resumed");
        }
        "reset" => {
            if let Err(e) = state.reset() {
                return CommandOutcome::Ignored(format!("reset failed: {e}"));
            }
            info!("↺ Race reset on a new track");
        }
        "set_speed" => {
            let Some(sp) = args["speed"].as_f64() else {
                return CommandOutcome::Ignored("set_speed needs `speed`".into());
            };
            state.speed = sp.clamp(0.1, 20.0);
            info!("⚡ Race speed set to {}×", state.speed);
        }
        "preset" => {
            let name = args["name"].as_str().unwrap_or("");
            match Preset::parse(name) {
                Ok(preset) => {
                    state.set_preset(preset);
                    info!("🌬 Preset '{name}' loaded");
                }
                Err(e) => return CommandOutcome::Ignored(e.to_string()),
            }
        }
        _ => return CommandOutcome::Ignored(format!("unknown control command: {cmd}")),
    }
    CommandOutcome::Applied
}

// ── Server ────────────────────────────────────────────────────────────────────

pub async fn serve(state: SharedState, update_rate_hz: f64, ctrl_port: u16) -> anyhow::Result<()> {
    let (telem_tx, _) = broadcast::channel::<String>(64);
    let telem_tx = Arc::new(telem_tx);

    let state_loop = state.clone();
    let telem_loop = telem_tx.clone();
    tokio::spawn(async move {
        race_loop(state_loop, telem_loop, update_rate_hz).await;
    });

    let ctrl_addr = format!("0.0.0.0:{ctrl_port}");
    info!("🖥  Race control WebSocket at ws://{ctrl_addr}/ws");

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "sail-sim ok" }))
        .with_state((state, telem_tx))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let listener = tokio::net::TcpListener::bind(&ctrl_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn race_loop(state: SharedState, telem: Arc<broadcast::Sender<String>>, update_rate_hz: f64) {
    let frame_secs = 1.0 / update_rate_hz;
    let mut ticker = interval(Duration::from_secs_f64(frame_secs));

    info!("⛵ Race loop running at {update_rate_hz} Hz");

    loop {
        ticker.tick().await;

        let json = {
            let mut s = state.write().await;
            if s.paused {
                continue;
            }
            let dt = frame_secs * s.speed;
            s.tick(dt);

            let frame = s.frame();
            if s.epoch % 600 == 0 {
                let leader = frame
                    .boats
                    .iter()
                    .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
                    .map(|b| b.name.as_str())
                    .unwrap_or("-");
                info!("⏱ epoch={} | boats={} | leader={leader}", s.epoch, frame.boats.len());
            }
            match frame.to_json() {
                Ok(json) => {
                    s.last_frame = Some(json.clone());
                    json
                }
                Err(e) => {
                    warn!("Telemetry: serialize failed: {e}");
                    continue;
                }
            }
        };

        // No subscribers is fine
        let _ = telem.send(json);
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State((state, telem_tx)): State<(SharedState, Arc<broadcast::Sender<String>>)>,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state, telem_tx))
}

async fn handle_ws(mut socket: WebSocket, state: SharedState, telem_tx: Arc<broadcast::Sender<String>>) {
    let mut telem_rx = telem_tx.subscribe();

    // Send current state immediately on connect
    let last = state.read().await.last_frame.clone();
    if let Some(frame) = last {
        let _ = socket.send(Message::Text(frame)).await;
    }

    loop {
        tokio::select! {
            Ok(msg) = telem_rx.recv() => {
                if socket.send(Message::Text(msg)).await.is_err() { break; }
            }
            Some(Ok(Message::Text(cmd))) = socket.recv() => {
                let v: Value = match serde_json::from_str(&cmd) {
                    Ok(v) => v,
                    Err(e) => { warn!("Bad control message: {e}"); continue; }
                };
                let outcome = apply_command(&mut *state.write().await, &v);
                if let CommandOutcome::Ignored(reason) = outcome {
                    warn!("{reason}");
                }
            }
            else => break,
        }
    }
}
