//! Simulation context plus the demo, watch, benchmark, and stress drivers.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::thread;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, trace, warn};

use crate::agent::{AgentController, Phase, StepOutcome};
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::grid::GridMap;
use crate::pathfinding::manhattan;
use crate::task_queue::TaskQueue;
use crate::types::{CellState, Label, Position, Task};

/// Running counters for a simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub created: usize,
    pub dispatched: usize,
    pub delivered: usize,
    pub abandoned: usize,
    pub cells_moved: u64,
}

/// Owns the grid, backlog, agent, and label overlay for one run.
///
/// Every command and tick goes through `&mut self`; nothing is global.
pub struct Simulation {
    grid: GridMap,
    queue: TaskQueue,
    agent: AgentController,
    labels: BTreeMap<Label, (Position, Position)>,
    rng: StdRng,
    ticks: u64,
    stats: Stats,
}

impl Simulation {
    /// Build the map from `config` (fixed layout or seeded generation).
    pub fn new(config: &SimConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let grid = match &config.layout {
            Some(rows) => GridMap::from_ascii(rows.as_slice()).ok_or(SimError::InvalidLayout)?,
            None => GridMap::generate(
                config.cols,
                config.rows,
                config.obstacle_attempts,
                config.start,
                &mut rng,
            ),
        };
        Self::with_rng(grid, config.start, rng)
    }

    /// Test-only constructor over a hand-built map.
    #[cfg(test)]
    pub fn from_grid(grid: GridMap, start: Position, seed: u64) -> Result<Self> {
        Self::with_rng(grid, start, StdRng::seed_from_u64(seed))
    }

    fn with_rng(grid: GridMap, start: Position, rng: StdRng) -> Result<Self> {
        if !grid.in_bounds(start) || grid.is_obstacle(start) {
            return Err(SimError::InvalidStart { pos: start });
        }
        Ok(Self {
            grid,
            queue: TaskQueue::new(),
            agent: AgentController::new(start),
            labels: BTreeMap::new(),
            rng,
            ticks: 0,
            stats: Stats::default(),
        })
    }

    /// Create a task on two random empty cells and queue it.
    ///
    /// Pickup and delivery are distinct and never placed under the agent.
    /// A rejected command leaves no markers behind.
    pub fn handle_add_task(&mut self) -> Result<Task> {
        let label = self.queue.next_label()?;
        let agent_at = self.agent.position();

        let pickup = self.grid.random_empty_cell(&mut self.rng, &[agent_at])?;
        self.grid.set_cell(pickup, CellState::Package)?;
        let delivery = match self.grid.random_empty_cell(&mut self.rng, &[agent_at]) {
            Ok(pos) => pos,
            Err(err) => {
                self.grid.set_cell(pickup, CellState::Empty)?;
                return Err(err);
            }
        };
        self.grid.set_cell(delivery, CellState::Target)?;

        let task = Task::new(label, pickup, delivery);
        self.queue.enqueue(task.clone())?;
        self.labels.insert(label, (pickup, delivery));
        self.stats.created += 1;
        debug!(%label, %pickup, %delivery, pending = self.queue.len(), "task added");
        Ok(task)
    }

    /// Hand the oldest pending task to the agent.
    pub fn handle_dispatch(&mut self) -> Result<Label> {
        match self.agent.dispatch(&mut self.queue, &mut self.grid) {
            Ok(label) => {
                self.stats.dispatched += 1;
                Ok(label)
            }
            Err(err @ SimError::UnreachableGoal { label, .. }) => {
                self.retire(label);
                self.stats.dispatched += 1;
                self.stats.abandoned += 1;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Advance exactly one tick.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let outcome = self.agent.tick(&mut self.grid)?;
        self.ticks += 1;
        match &outcome {
            StepOutcome::Moved(pos) => {
                self.stats.cells_moved += 1;
                trace!(tick = self.ticks, %pos, "moved");
            }
            StepOutcome::PickedUp(label) => trace!(tick = self.ticks, %label, "heading to delivery"),
            StepOutcome::Delivered(task) => {
                self.retire(task.label);
                self.stats.delivered += 1;
            }
            StepOutcome::Abandoned { task, reason } => {
                debug!(tick = self.ticks, %reason, "task dropped");
                self.retire(task.label);
                self.stats.abandoned += 1;
            }
            StepOutcome::Idle => {}
        }
        Ok(outcome)
    }

    fn retire(&mut self, label: Label) {
        self.labels.remove(&label);
        self.queue.release(label);
    }

    pub fn grid(&self) -> &GridMap {
        &self.grid
    }

    pub fn agent_position(&self) -> Position {
        self.agent.position()
    }

    pub fn phase(&self) -> Phase {
        self.agent.phase()
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.agent.active_task()
    }

    /// Label overlay: label -> (pickup, delivery) for pending and active tasks.
    pub fn labels(&self) -> &BTreeMap<Label, (Position, Position)> {
        &self.labels
    }

    pub fn backlog(&self) -> impl Iterator<Item = &Task> {
        self.queue.peek_all()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Text frame: `@` agent, `#` obstacle, uppercase label on a package,
    /// lowercase label on its delivery target.
    pub fn render_ascii(&self) -> String {
        let mut marks: BTreeMap<Position, char> = BTreeMap::new();
        for (label, (pickup, delivery)) in &self.labels {
            marks.insert(*pickup, label.as_char());
            marks.insert(*delivery, label.as_char().to_ascii_lowercase());
        }
        let cols = self.grid.cols() as usize;
        let agent = self.agent.position();
        let mut out = String::new();
        for (y, row) in self.grid.cells().chunks(cols).enumerate() {
            for (x, cell) in row.iter().enumerate() {
                let pos = Position::new(x as i32, y as i32);
                let glyph = match cell {
                    _ if pos == agent => '@',
                    CellState::Obstacle => '#',
                    CellState::Package | CellState::Target => marks.get(&pos).copied().unwrap_or('?'),
                    CellState::Empty => '.',
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }

    /// Consistency checks over the whole state; empty when healthy.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let pos = self.agent.position();
        let phase = self.agent.phase();

        if self.agent.active_task().is_some() != (phase != Phase::Idle) {
            violations.push(format!("active task does not match phase {phase:?}"));
        }
        if !self.grid.in_bounds(pos) || self.grid.is_obstacle(pos) {
            violations.push(format!("agent at {pos} is off the free grid"));
        }

        let mut prev = pos;
        for &next in self.agent.remaining_path() {
            if self.grid.is_obstacle(next) || manhattan(prev, next) != 1 {
                violations.push(format!("route step {prev} -> {next} is invalid"));
            }
            prev = next;
        }

        let marker = |at: Position, expected: CellState| self.grid.cell_at(at) == Ok(expected);
        for task in self.queue.peek_all() {
            if !marker(task.pickup, CellState::Package) || !marker(task.delivery, CellState::Target) {
                violations.push(format!("pending task {} lost a marker", task.label));
            }
        }
        if let Some(task) = self.agent.active_task() {
            if phase == Phase::MovingToPickup && !marker(task.pickup, CellState::Package) {
                violations.push(format!("active task {} lost its package", task.label));
            }
            if !marker(task.delivery, CellState::Target) {
                violations.push(format!("active task {} lost its target", task.label));
            }
        }

        let live = self.queue.len() + usize::from(self.agent.active_task().is_some());
        if self.labels.len() != live {
            violations.push(format!(
                "label overlay has {} entries for {live} live tasks",
                self.labels.len()
            ));
        }
        violations
    }
}

/// Result of driving a simulation until its backlog drains.
#[derive(Debug, Default)]
struct DriveReport {
    violations: usize,
    timed_out: bool,
}

/// Dispatch whenever idle and step until nothing is pending or in flight.
fn drive<F>(sim: &mut Simulation, max_ticks: u64, validate: bool, mut on_tick: F) -> Result<DriveReport>
where
    F: FnMut(&Simulation),
{
    let mut report = DriveReport::default();
    loop {
        if sim.phase() == Phase::Idle {
            if !sim.has_pending() {
                break;
            }
            match sim.handle_dispatch() {
                Ok(label) => debug!(%label, tick = sim.tick_count(), "dispatch"),
                Err(err) if err.is_recoverable() => {
                    warn!(%err, tick = sim.tick_count(), "dispatch rejected");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        if sim.tick_count() >= max_ticks {
            warn!(max_ticks, "tick limit reached");
            report.timed_out = true;
            break;
        }
        sim.step()?;
        on_tick(&*sim);
        if validate {
            for violation in sim.invariant_violations() {
                warn!(tick = sim.tick_count(), "{violation}");
                report.violations += 1;
            }
        }
    }
    Ok(report)
}

/// Queue up to `count` tasks; returns how many were rejected.
fn seed_tasks(sim: &mut Simulation, count: usize) -> Result<usize> {
    let mut rejected = 0usize;
    for _ in 0..count {
        match sim.handle_add_task() {
            Ok(task) => debug!(label = %task.label, "queued"),
            Err(err) if err.is_recoverable() => {
                debug!(%err, "task rejected");
                rejected += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(rejected)
}

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    // SAFETY: rusage is plain old data and getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let seconds = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0;
    Some((seconds(usage.ru_utime), seconds(usage.ru_stime)))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Run the default demo: queue a few tasks and service them all.
pub fn run_demo(config: &SimConfig) -> Result<()> {
    info!(seed = config.seed, "demo start");
    let mut sim = Simulation::new(config)?;
    let rejected = seed_tasks(&mut sim, config.demo_tasks)?;
    let start = Instant::now();
    let report = drive(&mut sim, config.max_ticks, true, |_| {})?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "demo finished");

    let stats = sim.stats();
    println!("DEMO SUMMARY");
    println!("seed={} grid={}x{}", config.seed, sim.grid().cols(), sim.grid().rows());
    println!("obstacles={}", sim.grid().count(CellState::Obstacle));
    println!("tasks_created={}", stats.created);
    println!("dispatched={}", stats.dispatched);
    println!("tasks_rejected={rejected}");
    println!("delivered={}", stats.delivered);
    println!("abandoned={}", stats.abandoned);
    println!("pending={}", sim.pending());
    println!("ticks={}", sim.tick_count());
    println!("cells_moved={}", stats.cells_moved);
    println!("timed_out={}", report.timed_out);
    println!("invariant_violation={}", report.violations > 0);
    print!("{}", sim.render_ascii());
    Ok(())
}

/// Like the demo, but paced by `tick_hz` and redrawing every tick.
pub fn run_watch(config: &SimConfig) -> Result<()> {
    let mut sim = Simulation::new(config)?;
    seed_tasks(&mut sim, config.demo_tasks)?;
    let frame = Duration::from_secs_f64(1.0 / f64::from(config.tick_hz));
    let report = drive(&mut sim, config.max_ticks, false, |sim| {
        let mut screen = String::from("\x1b[2J\x1b[H");
        let active = sim
            .active_task()
            .map(|t| t.label.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            screen,
            "tick={} agent={} phase={:?} active={} pending={}",
            sim.tick_count(),
            sim.agent_position(),
            sim.phase(),
            active,
            sim.pending()
        );
        let backlog: Vec<String> = sim.backlog().map(|t| t.label.to_string()).collect();
        let _ = writeln!(screen, "backlog=[{}]", backlog.join(" "));
        for (label, (pickup, delivery)) in sim.labels() {
            let _ = writeln!(screen, "  {label}: {pickup} -> {delivery}");
        }
        screen.push_str(&sim.render_ascii());
        print!("{screen}");
        thread::sleep(frame);
    })?;
    let stats = sim.stats();
    println!(
        "delivered={} abandoned={} timed_out={}",
        stats.delivered, stats.abandoned, report.timed_out
    );
    Ok(())
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    seed: u64,
    tasks: usize,
    rejected: usize,
    delivered: usize,
    abandoned: usize,
    ticks: u64,
    cells_moved: u64,
    elapsed_ms: f64,
    ticks_per_s: f64,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    violations: usize,
}

const BENCH_HEADER: &str = "seed,tasks,delivered,abandoned,ticks,cells_moved,elapsed_ms,ticks_per_s,cpu_user_s,cpu_sys_s,invariant_violations";

impl BenchResult {
    fn print_row(&self) {
        let cpu_user = self
            .cpu_user_s
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string());
        let cpu_sys = self
            .cpu_sys_s
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "NA".to_string());
        println!(
            "{},{},{},{},{},{},{:.2},{:.2},{},{},{}",
            self.seed,
            self.tasks,
            self.delivered,
            self.abandoned,
            self.ticks,
            self.cells_moved,
            self.elapsed_ms,
            self.ticks_per_s,
            cpu_user,
            cpu_sys,
            self.violations
        );
        if self.rejected > 0 {
            eprintln!("# warning,rejected_tasks,{}", self.rejected);
        }
    }
}

fn benchmark_once(config: &SimConfig, tasks: usize, seed: u64, validate: bool) -> Result<BenchResult> {
    let config = SimConfig {
        seed,
        ..config.clone()
    };
    let mut sim = Simulation::new(&config)?;
    let rejected = seed_tasks(&mut sim, tasks)?;

    let cpu_start = cpu_times_seconds();
    let start = Instant::now();
    let report = drive(&mut sim, config.max_ticks, validate, |_| {})?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let ticks = sim.tick_count();
    let ticks_per_s = if elapsed_ms > 0.0 {
        ticks as f64 / (elapsed_ms / 1000.0)
    } else {
        0.0
    };
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    let stats = sim.stats();
    Ok(BenchResult {
        seed,
        tasks: stats.created,
        rejected,
        delivered: stats.delivered,
        abandoned: stats.abandoned,
        ticks,
        cells_moved: stats.cells_moved,
        elapsed_ms,
        ticks_per_s,
        cpu_user_s,
        cpu_sys_s,
        violations: report.violations,
    })
}

/// Run a single benchmark with optional parameter overrides.
pub fn run_benchmark(
    config: &SimConfig,
    tasks: Option<usize>,
    seed: Option<u64>,
    validate: bool,
) -> Result<()> {
    let tasks = tasks.unwrap_or(crate::types::MAX_LABELS);
    let seed = seed.unwrap_or(config.seed);
    if tasks == 0 {
        eprintln!("benchmark error: tasks must be > 0");
        return Ok(());
    }
    let result = benchmark_once(config, tasks, seed, validate)?;
    println!("{BENCH_HEADER}");
    result.print_row();
    if validate && result.violations > 0 {
        eprintln!("# violation,invariants,{}", result.violations);
    }
    Ok(())
}

/// Sweep seeds and task counts and print CSV output.
pub fn run_stress(
    config: &SimConfig,
    seed_sets: Option<Vec<u64>>,
    task_sets: Option<Vec<usize>>,
    validate: bool,
) -> Result<()> {
    let seed_sets = seed_sets.unwrap_or_else(|| vec![1, 2, 3, 4, 5]);
    let mut task_sets = task_sets.unwrap_or_else(|| vec![5, 13, 26]);
    if task_sets.iter().any(|&tasks| tasks == 0) {
        let before = task_sets.len();
        task_sets.retain(|&tasks| tasks > 0);
        eprintln!(
            "stress warning: ignored {} task set(s) <= 0",
            before - task_sets.len()
        );
        if task_sets.is_empty() {
            eprintln!("stress error: tasks must be > 0");
            return Ok(());
        }
    }

    println!("{BENCH_HEADER}");
    for seed in seed_sets {
        for tasks in task_sets.iter().copied() {
            let result = benchmark_once(config, tasks, seed, validate)?;
            result.print_row();
            if validate && result.violations > 0 {
                eprintln!("# violation,invariants,{}", result.violations);
            }
        }
    }
    Ok(())
}
