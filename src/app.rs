use crate::cli::{Cli, Commands, parse_size};
use lightmode::engine::{self, FilterPlanner, PlanMode};
use lightmode::job::{BlobRegistry, ControllerState, JobController};
use lightmode::logging::{self, LogTarget};
use lightmode::{config, native_controller, ui};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

const LOAD_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(cli: Cli) {
    let mode = if cli.fast { Some(PlanMode::Fast) } else { None };

    // Handle subcommands first
    if let Some(command) = cli.command {
        if let Err(e) = logging::init(LogTarget::Stderr, cli.verbose) {
            eprintln!("Warning: {:#}", e);
        }
        match command {
            Commands::Convert { file, out, json } => handle_convert(&file, out, json, mode),
            Commands::Plan { file, size } => handle_plan(&file, size.as_deref(), mode),
            Commands::Probe { file } => handle_probe(&file),
            Commands::CheckEngine => handle_check_engine(),
            Commands::InitConfig => handle_init_config(),
        }
        return;
    }

    match LogTarget::default_file().and_then(|target| logging::init(target, cli.verbose)) {
        Ok(()) => {}
        Err(e) => eprintln!("Warning: file logging disabled: {:#}", e),
    }

    // Reported before the UI owns the terminal
    let config = config::Config::load_or_default();

    // Launch TUI (default behavior)
    if let Err(e) = ui::run_ui_with_options(cli.file, mode, &config) {
        eprintln!("Error running UI: {}", e);
        process::exit(1);
    }
}

fn handle_convert(file: &Path, out: Option<PathBuf>, json: bool, mode: Option<PlanMode>) {
    let config = config::Config::load_or_default();
    let mut controller = native_controller(&config, Box::new(BlobRegistry::new()));
    if let Some(mode) = mode {
        controller.set_mode(mode);
    }

    if let Err(e) = controller.initialize_engine(config.engine_resources()) {
        fail(&controller, &e.user_message());
    }
    if !controller.wait_until_settled(LOAD_TIMEOUT) || controller.state() != ControllerState::EngineReady {
        let message = controller
            .error_message()
            .unwrap_or_else(|| "Timed out loading the converter.".to_string());
        fail(&controller, &message);
    }

    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: Failed to read {}: {}", file.display(), e);
            process::exit(1);
        }
    };
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let source_id = match controller.accept_file(&name, bytes) {
        Ok(id) => id,
        Err(e) => fail(&controller, &e.user_message()),
    };

    let metadata = engine::probe_source(&config.engine.probe, file).map_err(|e| format!("{:#}", e));
    controller.attach_metadata(source_id, metadata);

    if let Err(e) = controller.transcode() {
        fail(&controller, &e.user_message());
    }

    let mut shown_lines = 0u64;
    while !controller.wait_until_settled(POLL_INTERVAL) {
        if !json {
            shown_lines = trace_new_logs(&controller, shown_lines);
            print!("\rProgress: {:.1}%", controller.progress_pct());
            std::io::stdout().flush().ok();
        }
    }
    if !json {
        trace_new_logs(&controller, shown_lines);
        println!("\rProgress: {:.1}%", controller.progress_pct());
    }

    if controller.state() != ControllerState::Succeeded {
        let message = controller
            .error_message()
            .unwrap_or_else(|| "Failed to process video. Please try another video.".to_string());
        if json {
            print_summary(&controller);
        }
        fail(&controller, &message);
    }

    let dir = out.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    match controller.save_output(&dir) {
        Ok(path) => {
            if json {
                print_summary(&controller);
            } else {
                println!("Saved: {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Engine log lines only reach the terminal with `--verbose` (via tracing).
fn trace_new_logs(controller: &JobController, from: u64) -> u64 {
    let mut next = from;
    for line in controller.logs().lines_since(from) {
        tracing::debug!(target: "lightmode::engine_log", "{}", line.text);
        next = line.sequence_index + 1;
    }
    next
}

fn print_summary(controller: &JobController) {
    if let Some(job) = controller.job() {
        match serde_json::to_string_pretty(&job.summary()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}

fn fail(controller: &JobController, message: &str) -> ! {
    eprintln!("Error: {}", message);
    let tail = controller.logs().tail(10);
    if !tail.is_empty() {
        eprintln!("Last engine output:");
        for line in tail {
            eprintln!("  {}", line);
        }
    }
    process::exit(1);
}

fn handle_plan(file: &Path, size: Option<&str>, mode: Option<PlanMode>) {
    let config = config::Config::load_or_default();
    let planner = FilterPlanner::new(config.planner_config());
    let mode = mode.unwrap_or_else(|| config.initial_mode());

    let (width, height) = match size {
        Some(value) => match parse_size(value) {
            Some(dims) => dims,
            None => {
                eprintln!("Error: expected WxH, got {:?}", value);
                process::exit(1);
            }
        },
        None => match engine::probe_source(&config.engine.probe, file) {
            Ok(meta) => (meta.width, meta.height),
            Err(e) => {
                eprintln!("Warning: {:#}; planning without dimensions", e);
                (0, 0)
            }
        },
    };

    let plan = planner.plan_for_dimensions(width, height, mode);
    println!("Mode: {}", mode.label());
    match plan.target {
        Some((w, h)) => println!("Output: {}x{}", w, h),
        None => println!("Output: source dimensions (resolved by the engine)"),
    }
    println!("{}", plan.to_command_line(&config.engine.core));
}

fn handle_probe(file: &Path) {
    let config = config::Config::load_or_default();
    match engine::probe_source(&config.engine.probe, file) {
        Ok(meta) => {
            match meta.duration_s {
                Some(d) => println!("Duration: {:.2} seconds", d),
                None => println!("Duration: unknown"),
            }
            println!("Dimensions: {}x{}", meta.width, meta.height);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_check_engine() {
    let config = config::Config::load_or_default();
    let mut ok = true;
    for binary in [&config.engine.core, &config.engine.probe] {
        match engine::engine_version(binary) {
            Ok(version) => println!("{} found: {}", binary, version),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ok = false;
            }
        }
    }
    process::exit(if ok { 0 } else { 1 });
}

fn handle_init_config() {
    match config::Config::config_path() {
        Ok(path) if path.exists() => match config::Config::load_from(&path) {
            Ok(cfg) => {
                println!("Config loaded successfully from {}", path.display());
                println!("{:#?}", cfg);
            }
            Err(e) => {
                eprintln!("Config invalid: {:#}", e);
                process::exit(1);
            }
        },
        Ok(path) => {
            println!("Creating default config...");
            if let Err(e) = config::Config::ensure_default() {
                eprintln!("Failed to save default config: {:#}", e);
                process::exit(1);
            }
            println!("Default config saved to {}", path.display());
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
