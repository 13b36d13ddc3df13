//! tm - touchmacro CLI
//!
//! Record touch macros from a sample feed, replay them, move them between
//! hosts as bundles, and run the trigger daemon.

mod dry_run;
mod samples;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use crossbeam_channel::select;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use touchmacro::prelude::*;
use touchmacro::scheduler::{AlarmRequest, Armed};
use touchmacro::{exchange, Error};

use crate::dry_run::DryRunCapability;

#[derive(Parser)]
#[command(name = "tm")]
#[command(about = "touchmacro - record, replay and schedule touch macros")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Macro storage directory, overriding the config
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Debug logging when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a macro from JSON-lines pointer samples
    Record {
        #[arg(short, long, default_value = "macro")]
        name: String,
        /// Sample file, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
        /// Pass finished strokes through to the input capability
        #[arg(long)]
        redispatch: bool,
    },
    /// Replay a stored macro
    Replay {
        id: String,
        #[arg(short, long)]
        speed: Option<f32>,
        /// Number of runs, -1 to loop until Ctrl+C
        #[arg(short, long, allow_hyphen_values = true)]
        repeat: Option<i32>,
        #[arg(long)]
        pause_ms: Option<u64>,
    },
    /// List stored macros
    List,
    /// Show a macro
    Show {
        id: String,
        /// Include every event
        #[arg(long)]
        all: bool,
    },
    /// Delete a macro
    Delete { id: String },
    /// Write a macro bundle
    Export {
        id: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Import a macro bundle under a new id
    Import { file: PathBuf },
    /// Set a macro's triggers. Picked up by the daemon on (re)start.
    Schedule {
        id: String,
        /// One-time start, RFC 3339
        #[arg(long)]
        at: Option<String>,
        /// Recurring period in minutes
        #[arg(long)]
        every: Option<u32>,
        /// Active days for the recurring trigger, 1 = Sunday .. 7 = Saturday
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,
    },
    /// Clear a macro's triggers
    Unschedule { id: String },
    /// Restore triggers and play macros as they fire, until Ctrl+C
    Daemon,
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    fn err(e: Error) -> Output<()> {
        Output {
            success: false,
            data: None,
            error: Some(e),
        }
    }
}

fn print_json<T: Serialize>(output: &T) {
    match serde_json::to_string_pretty(output) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: cannot encode output: {}", e),
    }
}

/// Shared handles every command works with.
struct Ctx {
    config: Config,
    store: Arc<MacroStorage>,
    runtime: Runtime,
}

impl Ctx {
    fn load(cli: &Cli) -> Result<Self> {
        let config = match cli.config.clone().or_else(Config::default_path) {
            Some(path) => Config::load(&path)?,
            None => Config::default(),
        };
        let dir = cli
            .store
            .clone()
            .or_else(|| config.storage_dir())
            .context("no storage directory; pass --store")?;
        let store = Arc::new(MacroStorage::with_dir(dir)?);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            config,
            store,
            runtime,
        })
    }

    fn capability(&self) -> Arc<dyn InputCapability> {
        Arc::new(DryRunCapability::new(self.runtime.handle().clone()))
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let result = Ctx::load(&cli).and_then(|ctx| match cli.command {
        Commands::Record {
            name,
            input,
            redispatch,
        } => record(&ctx, &name, &input, redispatch),
        Commands::Replay {
            id,
            speed,
            repeat,
            pause_ms,
        } => replay(&ctx, &id, speed, repeat, pause_ms),
        Commands::List => list(&ctx),
        Commands::Show { id, all } => show(&ctx, &id, all),
        Commands::Delete { id } => delete(&ctx, &id),
        Commands::Export { id, out } => export(&ctx, &id, out.as_deref()),
        Commands::Import { file } => import(&ctx, &file),
        Commands::Schedule {
            id,
            at,
            every,
            days,
        } => schedule(&ctx, &id, at.as_deref(), every, &days),
        Commands::Unschedule { id } => unschedule(&ctx, &id),
        Commands::Daemon => daemon(&ctx),
    });

    if let Err(e) = result {
        match e.downcast_ref::<Error>() {
            Some(err) => print_json(&Output::<()>::err(err.clone())),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

// ── Recording ───────────────────────────────────────────────────────────────

fn record(ctx: &Ctx, name: &str, input: &str, redispatch: bool) -> Result<()> {
    let reader: Box<dyn io::BufRead + Send> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input).with_context(|| format!("cannot open {}", input))?;
        Box::new(BufReader::new(file))
    };

    let recorder = TouchRecorder::with_config(ctx.config.recorder.clone());
    let mut redispatcher = redispatch.then(|| LiveRedispatcher::new(ctx.capability()));

    let (sample_tx, sample_rx) = crossbeam_channel::unbounded();
    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    eprintln!("Recording: {} (Ctrl+C to stop)", name);
    recorder.start();
    let _reader = samples::spawn_reader(reader, sample_tx);

    loop {
        select! {
            recv(sample_rx) -> msg => match msg {
                Ok(s) => {
                    let kept = recorder.add_event(s.x, s.y, s.action, s.pressure, s.pointer_id);
                    if let (Some(event), Some(r)) = (kept, redispatcher.as_mut()) {
                        r.on_event(&event);
                    }
                }
                Err(_) => break,
            },
            recv(stop_rx) -> _ => break,
        }
    }

    let result = recorder.stop();
    if result.is_empty() {
        anyhow::bail!("no events recorded, nothing saved");
    }

    let mut macro_ = Macro::new(
        Uuid::new_v4().to_string(),
        name,
        chrono::Utc::now().timestamp_millis(),
    );
    macro_.duration_ms = result.duration_ms;
    ctx.store.save_macro(&macro_, &result.events)?;
    info!(id = %macro_.id, events = result.events.len(), "macro saved");

    let saved = ctx.store.get_macro(&macro_.id)?;
    print_json(&Output::ok(saved));
    Ok(())
}

// ── Playback ────────────────────────────────────────────────────────────────

fn replay(
    ctx: &Ctx,
    id: &str,
    speed: Option<f32>,
    repeat: Option<i32>,
    pause_ms: Option<u64>,
) -> Result<()> {
    let macro_ = ctx.store.get_macro(id)?;
    let events = ctx.store.load_events(id)?;

    let mut settings = macro_.settings.clone();
    if let Some(speed) = speed {
        settings.speed = speed;
    }
    if let Some(repeat) = repeat {
        settings.repeat_count = repeat;
    }
    if let Some(pause_ms) = pause_ms {
        settings.pause_between_runs_ms = pause_ms;
    }

    let engine = PlaybackEngine::new(ctx.capability(), ctx.config.playback.clone());
    let stopper = engine.clone();
    ctrlc::set_handler(move || stopper.stop())?;

    eprintln!(
        "Replaying {} ({} events) at {}x...",
        macro_.name,
        events.len(),
        settings.speed
    );

    let final_state = ctx.runtime.block_on(async {
        let mut states = engine.subscribe();
        engine.execute_events(&events, &settings);
        loop {
            match states.recv().await {
                Ok(state) => {
                    eprintln!("{}", state);
                    if state.is_terminal() && !engine.is_active() {
                        break state;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break engine.state(),
            }
        }
    });

    print_json(&Output::ok(serde_json::json!({
        "id": macro_.id,
        "result": final_state,
    })));
    if let ExecutionState::Error { reason } = final_state {
        anyhow::bail!("playback failed: {}", reason);
    }
    Ok(())
}

// ── Storage ─────────────────────────────────────────────────────────────────

fn list(ctx: &Ctx) -> Result<()> {
    let macros = ctx.store.list_macros()?;
    print_json(&Output::ok(macros));
    Ok(())
}

fn show(ctx: &Ctx, id: &str, all: bool) -> Result<()> {
    let macro_ = ctx.store.get_macro(id)?;
    let events = ctx.store.load_events(id)?;

    let mut actions: BTreeMap<String, usize> = BTreeMap::new();
    for e in &events {
        *actions.entry(format!("{:?}", e.action).to_uppercase()).or_default() += 1;
    }
    let pointers: std::collections::BTreeSet<u32> = events.iter().map(|e| e.pointer_id).collect();

    let mut data = serde_json::json!({
        "macro": macro_,
        "strokes": build_strokes(&events).len(),
        "pointers": pointers.len(),
        "actions": actions,
    });
    if all {
        data["events"] = serde_json::to_value(&events)?;
    }
    print_json(&Output::ok(data));
    Ok(())
}

fn delete(ctx: &Ctx, id: &str) -> Result<()> {
    ctx.store.delete_macro(id)?;
    print_json(&Output::ok(serde_json::json!({ "deleted": id })));
    Ok(())
}

fn export(ctx: &Ctx, id: &str, out: Option<&Path>) -> Result<()> {
    let macro_ = ctx.store.get_macro(id)?;
    let events = ctx.store.load_events(id)?;
    let json = exchange::to_json(&macro_, &events)?;

    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(exchange::suggested_filename(&macro_.name)));
    fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
    print_json(&Output::ok(serde_json::json!({
        "id": id,
        "path": path.display().to_string(),
        "events": events.len(),
    })));
    Ok(())
}

fn import(ctx: &Ctx, file: &Path) -> Result<()> {
    let json =
        fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))?;
    let (macro_, events) = exchange::parse(&json).map_err(Error::from)?;
    ctx.store.save_macro(&macro_, &events)?;
    print_json(&Output::ok(ctx.store.get_macro(&macro_.id)?));
    Ok(())
}

// ── Scheduling ──────────────────────────────────────────────────────────────

/// Collects alarm requests so `schedule` can report what the daemon will arm.
#[derive(Default)]
struct PlanHost {
    planned: Mutex<Vec<AlarmRequest>>,
}

impl AlarmHost for PlanHost {
    fn can_schedule_exact(&self) -> bool {
        true
    }

    fn set_alarm(&self, request: AlarmRequest) {
        self.planned.lock().push(request);
    }

    fn cancel_alarm(&self, _id: TriggerId) {}
}

fn schedule(ctx: &Ctx, id: &str, at: Option<&str>, every: Option<u32>, days: &[u8]) -> Result<()> {
    let mut macro_ = ctx.store.get_macro(id)?;

    if let Some(at) = at {
        let at = DateTime::parse_from_rfc3339(at)
            .map_err(|e| Error::invalid_settings("at", &e.to_string()))?;
        macro_.settings.scheduled_time_ms = Some(at.timestamp_millis());
    }
    if let Some(every) = every {
        if every == 0 {
            return Err(Error::invalid_settings("every", "must be at least 1 minute").into());
        }
        macro_.settings.interval_minutes = Some(every);
    }
    if !days.is_empty() {
        macro_.settings.selected_days = DaySet::from_numbers(days).map_err(|n| {
            Error::invalid_settings("days", &format!("{} is not a day number (1-7)", n))
        })?;
    }
    ctx.store.update_macro(&macro_)?;

    let plan = Arc::new(PlanHost::default());
    let scheduler = Scheduler::new(plan.clone(), Arc::new(SystemClock), ctx.config.scheduler.clone());
    let armed: Armed = scheduler.schedule(&macro_);
    if armed.is_empty() {
        warn!(id, "macro has no pending trigger");
    }

    let alarms = plan.planned.lock().clone();
    print_json(&Output::ok(serde_json::json!({
        "id": id,
        "armed": armed,
        "alarms": alarms,
    })));
    Ok(())
}

fn unschedule(ctx: &Ctx, id: &str) -> Result<()> {
    let mut macro_ = ctx.store.get_macro(id)?;
    macro_.settings.scheduled_time_ms = None;
    macro_.settings.interval_minutes = None;
    macro_.settings.selected_days = DaySet::EVERY_DAY;
    ctx.store.update_macro(&macro_)?;
    print_json(&Output::ok(serde_json::json!({ "unscheduled": id })));
    Ok(())
}

fn daemon(ctx: &Ctx) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn MacroStore> = ctx.store.clone();
    let capability = ctx.capability();

    ctx.runtime.block_on(async {
        let (host, mut fired) = TokioAlarmHost::new(clock.clone(), true);
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(host),
            clock.clone(),
            ctx.config.scheduler.clone(),
        ));
        let restored = scheduler.restore(store.as_ref());
        eprintln!("{} macro(s) scheduled, waiting for triggers (Ctrl+C to stop)", restored);

        let engine = PlaybackEngine::new(capability, ctx.config.playback.clone());
        let launcher = Arc::new(EngineLauncher::new(
            engine.clone(),
            store.clone(),
            tokio::runtime::Handle::current(),
        ));
        let handler = TriggerHandler::new(scheduler, store, launcher, clock);

        loop {
            tokio::select! {
                Some(payload) = fired.recv() => {
                    let outcome = handler.on_trigger(&payload);
                    info!(
                        id = %payload.macro_id,
                        played = outcome.played,
                        rearmed = outcome.rearmed,
                        "trigger handled"
                    );
                }
                _ = tokio::signal::ctrl_c() => break,
                else => break,
            }
        }
        engine.stop();
    });
    Ok(())
}
