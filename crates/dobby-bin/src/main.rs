//! `drawboy` entrypoint: wires the draft loader, pick-list compiler,
//! protocol engine, renderer, and terminal together (spec §6 "CLI surface
//! (driver)").

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Once;

use anyhow::{Context, Result};
use clap::Parser;
use dobby_config::{Cli, Options};
use dobby_draft::Draft;
use dobby_proto::{Engine, EngineConfig, LoomConn};
use dobby_terminal::Terminal;
use dobby_view::ViewState;
use tracing_appender::non_blocking::WorkerGuard;

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    /// Sets up `tracing`, matching `ox-bin::AppStartup::configure_logging`:
    /// a non-blocking file writer under the OS temp directory when `--log`
    /// is set (spec §6 "Log file"), otherwise an env-filtered stderr writer
    /// so `RUST_LOG` still works while developing.
    fn configure_logging(&mut self, enabled: bool) -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::from_default_env();

        if !enabled {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            return Ok(());
        }

        let log_dir = std::env::temp_dir();
        let file_name = format!(
            "drawboy_{}.log",
            chrono::Local::now().format("%Y-%m-%d-%H:%M:%S")
        );
        let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .try_init()
        {
            Ok(()) => self.log_guard = Some(guard),
            Err(_) => {
                // Global subscriber already installed (e.g. under test harnesses).
            }
        }
        eprintln!("logging to {}", log_dir.join(&file_name).display());
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut startup = AppStartup::new();
    if let Err(err) = startup.configure_logging(cli.log) {
        eprintln!("error: {err:#}");
        return ExitCode::from(4);
    }
    AppStartup::install_panic_hook();

    tracing::info!(target: "runtime", "startup");

    // spec §7: "the entry point wraps the whole driver in a try/catch that
    // maps system errors and runtime errors to exit code 4; any other
    // exception surfaces as 'Unexpected error' with code 5."
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(cli))) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            eprintln!("error: {err:#}");
            ExitCode::from(4)
        }
        Err(_) => {
            eprintln!("Unexpected error");
            ExitCode::from(5)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let options = Options::resolve(cli).context("resolving options")?;

    if options.findloom {
        return find_loom();
    }

    let draft = load_draft(&options.draft_path)
        .with_context(|| format!("loading draft {}", options.draft_path.display()))?;

    if options.check {
        println!(
            "{}: {} shafts, {} ends, {} picks -- parses OK",
            options.draft_path.display(),
            draft.max_shafts,
            draft.ends,
            draft.picks
        );
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(drive_loom(options, draft))
}

/// Dispatches on the draft file's extension: `.wif` to [`dobby_draft::wif`],
/// `.dtx` to [`dobby_draft::dtx`]. Neither loader needs its file handle kept
/// open past this call (spec §5 "Resources").
fn load_draft(path: &Path) -> Result<Draft> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let draft = match ext.as_str() {
        "wif" => dobby_draft::wif::load(path)?,
        "dtx" => dobby_draft::dtx::load(path)?,
        _ => anyhow::bail!(
            "unrecognised draft file extension (expected .wif or .dtx): {}",
            path.display()
        ),
    };
    Ok(draft)
}

async fn drive_loom(options: Options, draft: Draft) -> Result<()> {
    let (pattern_before_tabby, tabby_a_first) = options.tabby_pattern.flags();
    let pick_sequence = dobby_picks::compile(
        &options.pick_list,
        draft.picks,
        pattern_before_tabby,
        tabby_a_first,
        options.treadle_threading,
    )
    .context("compiling pick list")?;

    let start_cursor = pick_sequence
        .iter()
        .position(|&p| p == options.start_pick)
        .unwrap_or(0);
    let view = ViewState::new(pick_sequence, start_cursor, true);

    let engine = Engine::new(
        EngineConfig {
            generation: options.generation,
            dobby_type: options.dobby_type,
            tabby_a_mask: options.tabby_a_mask,
            tabby_b_mask: options.tabby_b_mask,
        },
        view,
    );

    let conn = LoomConn::connect(&options.loom_address, options.generation)
        .await
        .context("connecting to loom")?;

    let terminal = Terminal::new();
    let renderer = dobby_render::Renderer::new(
        options.capabilities,
        options.dobby_type,
        options.tabby_a_mask,
        options.tabby_b_mask,
        options.tabby_color,
        options.color_alert,
    );

    let is_gen4 = options.generation.is_gen4();
    let pickfile_path = options.pickfile_path;

    dobby_proto::runtime::run(
        engine,
        draft,
        conn,
        terminal,
        renderer,
        is_gen4,
        move |pick| dobby_config::pickfile::write(&pickfile_path, pick),
    )
    .await
}

/// `--findloom`: asks the weaver to unplug, then plug in, the loom's USB
/// dongle, diffing `/dev` before and after to spot the new device file
/// (grounded on `original_source/DrawBoy/args.cpp`'s `enumSerial`
/// before/after scan). Never drives the loom.
fn find_loom() -> Result<()> {
    println!("Make sure that the USB dongle is unplugged, and then press return.");
    wait_for_enter()?;
    println!("Scanning for pre-existing devices...");
    let before = list_dev_entries()?;

    println!("Now plug in the USB dongle, wait a few seconds, and press return.");
    wait_for_enter()?;
    println!("Scanning for new devices...");
    let after = list_dev_entries()?;

    let new_devices: Vec<_> = after.difference(&before).cloned().collect();
    if new_devices.is_empty() {
        println!("Alas! No new devices were found.");
    } else {
        println!("Candidate devices:");
        for dev in new_devices {
            println!("{dev}");
        }
    }
    Ok(())
}

fn wait_for_enter() -> Result<()> {
    let mut buf = String::new();
    std::io::stdin()
        .read_line(&mut buf)
        .context("reading from stdin")?;
    std::io::stdout().flush().ok();
    Ok(())
}

fn list_dev_entries() -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for entry in std::fs::read_dir("/dev").context("reading /dev")? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("tty") || name.starts_with("cu.") {
            set.insert(format!("/dev/{name}"));
        }
    }
    Ok(set)
}
