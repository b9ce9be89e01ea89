mod agent;
mod config;
mod error;
mod grid;
mod logging;
mod pathfinding;
mod sim;
mod task_queue;
mod types;

use config::SimConfig;

fn parse_list<T: std::str::FromStr>(arg: &str) -> Option<Vec<T>> {
    if arg == "-" {
        return None;
    }
    let mut values = Vec::new();
    for part in arg.split(',') {
        if part.trim().is_empty() {
            return None;
        }
        let value = part.trim().parse::<T>().ok()?;
        values.push(value);
    }
    Some(values)
}

fn print_usage(program: &str) {
    println!("Grid Courier CLI");
    println!("Usage:");
    println!("  {program} [--config PATH] (run demo)");
    println!("  {program} [--config PATH] watch");
    println!("  {program} [--config PATH] bench [tasks] [seed] [validate]");
    println!("  {program} [--config PATH] stress [seed_sets] [task_sets] [validate]");
    println!("  {program} --help");
    println!();
    println!("Sets are comma-separated lists (e.g., 1,2,3). Use \"-\" to keep the default set.");
    println!("Defaults:");
    println!("  bench  tasks=26 seed=<config seed>");
    println!("  stress seeds=1,2,3,4,5 tasks=5,13,26");
    println!("Flags:");
    println!("  validate  check state invariants after every tick");
    println!("Set RUST_LOG (e.g. RUST_LOG=debug) to change log verbosity.");
}

fn exit_with_usage(program: &str, message: &str) -> ! {
    eprintln!("{message}");
    print_usage(program);
    std::process::exit(2);
}

fn main() {
    logging::init();

    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "grid_courier".to_string());
    let mut args = std::env::args().skip(1).peekable();

    let config = if args.peek().map(String::as_str) == Some("--config") {
        args.next();
        let Some(path) = args.next() else {
            exit_with_usage(&program, "--config needs a path");
        };
        match SimConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => exit_with_usage(&program, &format!("{path}: {err}")),
        }
    } else {
        SimConfig::default()
    };

    let result = match args.next().as_deref() {
        None | Some("demo") => sim::run_demo(&config),
        Some("watch") => sim::run_watch(&config),
        Some("bench") => {
            let tasks = args.next().and_then(|v| v.parse::<usize>().ok());
            let seed = args.next().and_then(|v| v.parse::<u64>().ok());
            let validate = args.any(|arg| arg == "validate");
            sim::run_benchmark(&config, tasks, seed, validate)
        }
        Some("stress") => {
            let mut seed_sets: Option<Vec<u64>> = None;
            let mut task_sets: Option<Vec<usize>> = None;
            let mut seed_sets_done = false;
            let mut task_sets_done = false;
            let mut validate = false;

            for arg in args {
                if arg == "validate" {
                    validate = true;
                    continue;
                }
                if !seed_sets_done {
                    seed_sets_done = true;
                    if arg != "-" {
                        seed_sets = Some(parse_list(&arg).unwrap_or_else(|| {
                            exit_with_usage(&program, &format!("stress: invalid seed_sets value: {arg}"))
                        }));
                    }
                    continue;
                }
                if !task_sets_done {
                    task_sets_done = true;
                    if arg != "-" {
                        task_sets = Some(parse_list(&arg).unwrap_or_else(|| {
                            exit_with_usage(&program, &format!("stress: invalid task_sets value: {arg}"))
                        }));
                    }
                    continue;
                }
                exit_with_usage(&program, &format!("stress: unexpected argument: {arg}"));
            }

            sim::run_stress(&config, seed_sets, task_sets, validate)
        }
        Some("--help") | Some("-h") | Some("help") => {
            print_usage(&program);
            Ok(())
        }
        Some(other) => exit_with_usage(&program, &format!("unknown command: {other}")),
    };

    if let Err(err) = result {
        eprintln!("simulation error: {err}");
        std::process::exit(1);
    }
}
