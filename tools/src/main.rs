//! trace-replay: headless replay of a recorded DTN simulation run.
//!
//! Usage:
//!   trace-replay 7 --db logs/sim.db
//!   trace-replay 7 --ipc-mode --policy exclude-deleted --role client
//!   trace-replay --list
//!   trace-replay --reset-eval
//!
//! Without --db the database location comes from SIM_DB_URI / SIM_LOG_DIR.

use anyhow::{bail, Context, Result};
use dtn_trace_core::{
    ChannelRole, EnvConfig, FrameSink, PossessionPolicy, QueryOptions, ReplayDriver, Run,
    RunConfiguration, Snapshot, TemporalQuery, TraceResult, TraceStore,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Next,
    Prev,
    Seek { t: f64 },
    Quit,
}

/// Writes every rendered frame as one JSON line.
struct JsonLinesSink<W: Write> {
    out: W,
    frames: u64,
}

impl<W: Write> FrameSink for JsonLinesSink<W> {
    fn render(&mut self, frame: &Snapshot) -> TraceResult<()> {
        serde_json::to_writer(&mut self.out, frame)?;
        writeln!(self.out)?;
        self.out.flush()?;
        self.frames += 1;
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let list = args.iter().any(|a| a == "--list");
    let reset_eval = args.iter().any(|a| a == "--reset-eval");
    let db_path = match flag_value(&args, "--db") {
        Some(path) => path.to_string(),
        None => {
            let env_cfg = EnvConfig::from_env();
            env_cfg.ensure_log_dir()?;
            env_cfg.db_path.to_string_lossy().into_owned()
        }
    };
    let options = QueryOptions {
        possession: PossessionPolicy::parse(flag_value(&args, "--policy").unwrap_or("created-only"))?,
        channel_role: ChannelRole::parse(flag_value(&args, "--role").unwrap_or("peripheral"))?,
    };

    let store = TraceStore::open(&db_path).with_context(|| format!("opening {db_path}"))?;
    store.init_tables()?;
    store.init_eval_tables()?;

    if reset_eval {
        store.reset_eval_tables()?;
        println!("analysis relations dropped from {db_path}");
        return Ok(());
    }
    if list {
        for run in store.runs()? {
            println!(
                "{:>5}  {:<24} {:<10} {:>8.0}s  {} devices",
                run.id,
                run.name,
                run.status.as_str(),
                run.simulation_time_seconds(),
                run.device_count()
            );
        }
        return Ok(());
    }

    let Some(run_id) = positional_run_id(&args)? else {
        bail!("usage: trace-replay <run_id> [--db PATH] [--policy created-only|exclude-deleted] [--role client|peripheral] [--ipc-mode]");
    };

    let query = TemporalQuery::new(&store, run_id)?.with_options(options);
    let bundle = store.broadcast_bundle(run_id)?;

    if ipc_mode {
        let sink = JsonLinesSink { out: io::stdout(), frames: 0 };
        let mut driver = ReplayDriver::new(query, bundle.id, sink);
        driver.render_current()?;
        run_ipc_loop(&mut driver)?;
        log::info!("IPC session ended after {} frames", driver.sink().frames);
    } else {
        print_summary(&store, query.run())?;
        let sink = JsonLinesSink { out: io::sink(), frames: 0 };
        let mut driver = ReplayDriver::new(query, bundle.id, sink);
        let frame = driver.render_current()?;
        print_frame(&frame);
    }

    Ok(())
}

fn run_ipc_loop<W: Write>(driver: &mut ReplayDriver<'_, JsonLinesSink<W>>) -> Result<()> {
    let stdin = io::stdin();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Unknown command: {}", buffer.trim());
                let mut stdout = io::stdout();
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => {
                driver.render_current()?;
            }
            IpcCommand::Next => {
                driver.advance()?;
            }
            IpcCommand::Prev => {
                driver.retreat()?;
            }
            IpcCommand::Seek { t } => {
                driver.seek(t)?;
            }
        }
    }
    Ok(())
}

fn print_summary(store: &TraceStore, run: &Run) -> Result<()> {
    println!("=== RUN {} ===", run.id);
    println!("  name:           {}", run.name);
    println!("  group:          {}", run.group.as_deref().unwrap_or("-"));
    println!("  status:         {}", run.status.as_str());
    println!("  seed:           {}", run.seed);
    println!("  simulated:      {:.0}s", run.simulation_time_seconds());
    println!("  progress:       {}", run.progress);
    println!("  devices:        {}", run.device_count());
    if let Some(end_ts) = run.end_ts {
        println!("  wall time:      {}s", (end_ts - run.start_ts).num_seconds());
    }
    match RunConfiguration::parse(&run.configuration_json) {
        Ok(cfg) => println!("  model:          {}", cfg.model),
        Err(e) => log::warn!("Run {} has no usable configuration: {e}", run.id),
    }
    println!("  events:         {}", store.event_count(run.id)?);
    println!("  positions:      {}", store.position_sample_count(run.id)?);
    println!("  connections:    {}", store.conn_infos(run.id)?.len());
    println!("  bundles:        {}", store.bundles(run.id)?.len());
    println!();
    Ok(())
}

fn print_frame(frame: &Snapshot) {
    println!("=== FRAME @ {}us ===", frame.us);
    for (device, pos) in &frame.positions {
        let marker = if frame.possesses(*device) { "*" } else { " " };
        println!("  {marker} device {device:>4}  ({:>9.2}, {:>9.2})", pos.x, pos.y);
    }
    println!("  active links:   {}", frame.active_connections.len());
    println!("  holders:        {}", frame.possessed_by.len());
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// The first argument that is neither a flag nor a flag's value.
fn positional_run_id(args: &[String]) -> Result<Option<i64>> {
    const VALUED: [&str; 3] = ["--db", "--policy", "--role"];
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if VALUED.contains(&arg.as_str()) {
            iter.next();
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        let id = arg.parse().with_context(|| format!("run id must be an integer, got '{arg}'"))?;
        return Ok(Some(id));
    }
    Ok(None)
}
