//! Beltforge entrypoint.

mod catalog;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Once;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use core_problem::Problem;
use core_solve::Outcome;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "beltforge", version, about = "Belt balancer layout synthesis")]
struct Args {
    /// Optional configuration file path (overrides discovery of
    /// `beltforge.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve a catalogued balancer and print its layout.
    Solve {
        /// Catalog name, see `list`.
        name: String,
        /// Accept the first satisfying layout instead of minimising area.
        #[arg(long)]
        feasible: bool,
        /// Single worker, fixed seed; runs are bit-for-bit reproducible.
        #[arg(long)]
        deterministic: bool,
        /// Run the solver portfolio on all available threads.
        #[arg(long)]
        parallel: bool,
        /// Wall-clock budget in seconds.
        #[arg(long, value_name = "SECONDS")]
        time_limit: Option<u64>,
        /// Raise solver verbosity on stderr.
        #[arg(long)]
        progress: bool,
        /// Also print the blueprint exchange string.
        #[arg(long)]
        blueprint: bool,
        /// Build the model but skip the solver.
        #[arg(long)]
        no_solve: bool,
        /// Glyph grid pinned as hard constraints.
        #[arg(long, value_name = "FILE")]
        seed: Option<PathBuf>,
        /// Glyph grids suggested to the search; repeatable.
        #[arg(long, value_name = "FILE")]
        hint: Vec<PathBuf>,
    },
    /// List catalogued balancer names.
    List,
}

fn configure_logging() -> Option<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(Path::new("."), "beltforge.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        // A global subscriber is already installed; drop the guard so the
        // writer shuts down.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            error!(target: "runtime", error = ?err, "fatal");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    match args.command {
        Command::List => {
            for entry in catalog::entries() {
                println!("{:<16} {}", entry.name, entry.summary);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Solve {
            name,
            feasible,
            deterministic,
            parallel,
            time_limit,
            progress,
            blueprint,
            no_solve,
            seed,
            hint,
        } => {
            let Some(mut problem) = catalog::build(&name) else {
                eprintln!("balancer '{name}' not found; try `beltforge list`");
                return Ok(ExitCode::FAILURE);
            };
            let config = core_config::load_from(args.config)?;
            config.apply_defaults(&mut problem);

            problem.options.feasible_ok |= feasible;
            problem.options.deterministic |= deterministic;
            problem.options.max_parallel |= parallel;
            problem.options.show_progress |= progress;
            problem.options.disable_solve |= no_solve;
            if let Some(secs) = time_limit {
                problem.options.time_limit = Some(Duration::from_secs(secs));
            }
            if let Some(path) = seed {
                problem.seed = Some(read_grid(&path)?);
            }
            for path in hint {
                problem.hints.push(read_grid(&path)?);
            }

            info!(target: "catalog", name = name.as_str(), "instance_selected");
            solve_and_print(&problem, blueprint)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_grid(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("reading glyph grid {}", path.display()))
}

fn solve_and_print(problem: &Problem, blueprint: bool) -> Result<()> {
    let report = core_solve::solve(problem)?;
    match report.outcome {
        Outcome::Optimal | Outcome::Feasible => {
            let Some(solution) = report.solution.as_ref() else {
                anyhow::bail!("solver reported a satisfying outcome without a solution");
            };
            println!(
                "solution is {}",
                if report.outcome == Outcome::Optimal {
                    "optimal"
                } else {
                    "feasible"
                }
            );
            if let Some(cost) = solution.objective() {
                println!("cost: {cost}");
            }
            println!("{}", core_render::render(solution.layout()));
            if blueprint {
                let encoded = core_blueprint::exchange_string(solution.layout(), "Belt balancer")?;
                println!("{encoded}");
            }
        }
        Outcome::Infeasible => println!("no solution"),
        Outcome::Unknown => println!("not decided"),
    }
    Ok(())
}
