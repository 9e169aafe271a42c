//! Process driver: builds the sweep of equilibrium problems for a task, solves the points
//! in parallel and writes the result tables.
//!
//! * Task1: etching of Al by HCl, T = 350..650 C
//! * Task2: etching of Ga by HCl, T = 650..950 C
//! * Task3: AlGaN deposition at 1100 C, Pg(AlCl3) + Pg(GaCl) = 30 Pa, in pure N2 and in N2/H2
use crate::Utils::logger::{ColumnFormat, OutputError, save_columns_to_file, save_table_to_csv};
use crate::Utils::task_parser::{TaskDocument, TaskError};
use crate::chemistry::equilibrium::{
    BOUNDARY_LAYER, EquilibriumError, EquilibriumProblem, EquilibriumSolution, Metal, Pressures,
    SolveSettings, algan_system, chloride_system,
};
use crate::chemistry::thermo_data::{ThermoData, ThermoDataError};
use crate::numerical::Nonlinear_systems::equation_system::{Method, SolveStatus, SolverConfig};
use crate::numerical::Nonlinear_systems::line_search::LineSearchMethod;
use crate::numerical::Nonlinear_systems::solver_utils::{elapsed_time, log_statistics};
use log::{error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// Celsius to Kelvin, rounded the same way throughout the tables
pub const ZERO_CELSIUS: f64 = 273.0;
/// Pg(AlCl3) + Pg(GaCl) in task 3, Pa
pub const METAL_CHLORIDE_PRESSURE: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessError {
    Data(ThermoDataError),
    Equilibrium { point: String, error: EquilibriumError },
    Output(OutputError),
    Task(TaskError),
    InvalidParameter(String),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProcessError::Data(e) => write!(f, "{}", e),
            ProcessError::Equilibrium { point, error } => {
                write!(f, "Point {} failed: {}", point, error)
            }
            ProcessError::Output(e) => write!(f, "{}", e),
            ProcessError::Task(e) => write!(f, "{}", e),
            ProcessError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for ProcessError {}

impl From<ThermoDataError> for ProcessError {
    fn from(e: ThermoDataError) -> Self {
        ProcessError::Data(e)
    }
}

impl From<OutputError> for ProcessError {
    fn from(e: OutputError) -> Self {
        ProcessError::Output(e)
    }
}

impl From<TaskError> for ProcessError {
    fn from(e: TaskError) -> Self {
        ProcessError::Task(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum Task {
    #[strum(serialize = "task1")]
    Task1,
    #[strum(serialize = "task2")]
    Task2,
    #[strum(serialize = "task3")]
    Task3,
}

impl Task {
    pub fn from_name(name: &str) -> Result<Self, ProcessError> {
        match name.trim().to_lowercase().as_str() {
            "task1" | "1" | "alclx" => Ok(Task::Task1),
            "task2" | "2" | "gaclx" => Ok(Task::Task2),
            "task3" | "3" | "algan" => Ok(Task::Task3),
            _ => Err(ProcessError::InvalidParameter(format!(
                "unknown task {}, expected task1, task2 or task3",
                name
            ))),
        }
    }

    /// start, stop and step in Celsius
    pub fn default_temperatures(&self) -> (f64, f64, f64) {
        match self {
            Task::Task1 => (350.0, 650.0, 10.0),
            Task::Task2 => (650.0, 950.0, 10.0),
            Task::Task3 => (1100.0, 1100.0, 10.0),
        }
    }

    /// columns that get their own two-column table
    pub fn derived_values(&self) -> [&'static str; 4] {
        match self {
            Task::Task1 => ["G(AlCl)", "G(AlCl2)", "G(AlCl3)", "Ve(Al)"],
            Task::Task2 => ["G(GaCl)", "G(GaCl2)", "G(GaCl3)", "Ve(Ga)"],
            Task::Task3 => ["G(AlCl3)", "G(GaCl)", "Vg(AlGaN)", "x"],
        }
    }
}

/// Carrier gas of the deposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Carrier {
    N2,
    N2H2,
}

impl Carrier {
    pub fn label(&self) -> &'static str {
        match self {
            Carrier::N2 => "N2",
            Carrier::N2H2 => "N2_H2",
        }
    }

    /// ammonia at 1500 Pa, no HCl, the rest is carrier (H2/N2 = 1/9 for the mixture)
    pub fn apply(&self, pressures: Pressures) -> Pressures {
        let pressures = pressures.with("NH3", 1500.0).with("HCl", 0.0);
        match self {
            Carrier::N2 => pressures.with("N2", 98470.0).with("H2", 0.0),
            Carrier::N2H2 => pressures.with("N2", 88623.0).with("H2", 9847.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    Chloride(Metal),
    AlGaN,
}

/// One independent solve of a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessPoint {
    pub index: usize,
    /// output table the point belongs to
    pub group: String,
    pub kind: ProblemKind,
    pub T: f64,
    pub pressures: Pressures,
    /// swept variable: name and value
    pub argument: (String, f64),
}

impl ProcessPoint {
    pub fn build(&self, data: &ThermoData) -> Result<EquilibriumProblem, EquilibriumError> {
        match self.kind {
            ProblemKind::Chloride(metal) => chloride_system(metal, data, &self.pressures, self.T),
            ProblemKind::AlGaN => algan_system(data, &self.pressures, self.T),
        }
    }

    fn describe(&self) -> String {
        format!("{} {} = {}", self.group, self.argument.0, self.argument.1)
    }
}

/// start, start + step, ... up to stop inclusive
pub fn temperature_range(start: f64, stop: f64, step: f64) -> Result<Vec<f64>, ProcessError> {
    if !(step > 0.0) || !(stop >= start) {
        return Err(ProcessError::InvalidParameter(format!(
            "temperature range {}..{} with step {} is empty",
            start, stop, step
        )));
    }
    let n = ((stop - start) / step + 1e-9).floor() as usize + 1;
    Ok((0..n).map(|k| start + k as f64 * step).collect())
}

/// Process settings; the defaults reproduce the standard runs
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub task: Task,
    pub data_bank: PathBuf,
    pub output_dir: PathBuf,
    /// Celsius; None keeps the task's own range
    pub temperatures: Option<(f64, f64, f64)>,
    /// boundary layer thickness, m
    pub delta: f64,
    pub seed: u64,
    pub settings: SolveSettings,
    pub solver: SolverConfig,
    /// input pressures replacing the defaults
    pub pressures: Vec<(String, f64)>,
    pub loglevel: Option<String>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            task: Task::Task1,
            data_bank: PathBuf::from("Bank_TD_Fragment.dat"),
            output_dir: PathBuf::from("results"),
            temperatures: None,
            delta: BOUNDARY_LAYER,
            seed: 0,
            settings: SolveSettings::default(),
            solver: SolverConfig::default(),
            pressures: Vec::new(),
            loglevel: None,
        }
    }
}

impl ProcessConfig {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            ..Self::default()
        }
    }

    /// Settings from a task file with the sections `solver`, `process` and `pressures`;
    /// anything absent keeps its default
    pub fn from_task(task: &TaskDocument) -> Result<Self, ProcessError> {
        let invalid = |e: &dyn fmt::Display| ProcessError::InvalidParameter(e.to_string());
        let mut config = ProcessConfig::default();
        if let Some(name) = task.get_string("process", "task")? {
            config.task = Task::from_name(&name)?;
        }
        if let Some(path) = task.get_string("process", "data_bank")? {
            config.data_bank = PathBuf::from(path);
        }
        if let Some(path) = task.get_string("process", "output_dir")? {
            config.output_dir = PathBuf::from(path);
        }
        if let Some(delta) = task.get_f64("process", "delta")? {
            config.delta = delta;
        }
        if let Some(t) = task.get_f64_list("process", "temperature")? {
            config.temperatures = match t.as_slice() {
                [t] => Some((*t, *t, 1.0)),
                [start, stop, step] => Some((*start, *stop, *step)),
                _ => {
                    return Err(ProcessError::InvalidParameter(
                        "temperature takes one value or start, stop, step".to_string(),
                    ));
                }
            };
        }

        if let Some(name) = task.get_string("solver", "method")? {
            config.settings.method = Method::from_name(&name).map_err(|e| invalid(&e))?;
        }
        if let Some(tolerance) = task.get_f64("solver", "tolerance")? {
            config.settings.tolerance = tolerance;
        }
        if let Some(max_iterations) = task.get_usize("solver", "max_iterations")? {
            config.settings.max_iterations = max_iterations;
        }
        if let Some(max_attempts) = task.get_usize("solver", "max_attempts")? {
            config.settings.max_attempts = max_attempts;
        }
        if let Some(seed) = task.get_usize("solver", "seed")? {
            config.seed = seed as u64;
        }
        if let Some(name) = task.get_string("solver", "line_search")? {
            config
                .solver
                .set_line_search(LineSearchMethod::from_name(&name).map_err(|e| invalid(&e))?);
        }
        if let Some(max_restarts) = task.get_usize("solver", "max_restarts")? {
            config.solver.set_max_restarts(max_restarts);
        }
        if let Some(seconds) = task.get_f64("solver", "deadline")? {
            let deadline = Duration::try_from_secs_f64(seconds).map_err(|e| invalid(&e))?;
            config.solver.set_deadline(Some(deadline));
        }
        if let Some(level) = task.get_string("solver", "loglevel")? {
            config.solver.set_loglevel(Some(level.clone()));
            config.loglevel = Some(level);
        }
        config.solver.validate().map_err(|e| invalid(&e))?;

        if let Some(section) = task.section("pressures") {
            let mut species: Vec<&String> = section.keys().collect();
            species.sort();
            for s in species {
                let p = TaskDocument::require(task.get_f64("pressures", s)?, "pressures", s)?;
                config.pressures.push((s.clone(), p));
            }
        }
        Ok(config)
    }

    fn base_pressures(&self) -> Pressures {
        let mut pressures = Pressures::chloride_defaults();
        for (species, p) in &self.pressures {
            pressures.set(species, *p);
        }
        pressures
    }

    /// The points of the configured task, in output order
    pub fn points(&self) -> Result<Vec<ProcessPoint>, ProcessError> {
        let (start, stop, step) = self
            .temperatures
            .unwrap_or_else(|| self.task.default_temperatures());
        let mut points = Vec::new();
        match self.task {
            Task::Task1 | Task::Task2 => {
                let metal = if self.task == Task::Task1 {
                    Metal::Al
                } else {
                    Metal::Ga
                };
                for t in temperature_range(start, stop, step)? {
                    let T = t + ZERO_CELSIUS;
                    points.push(ProcessPoint {
                        index: points.len(),
                        group: self.task.to_string(),
                        kind: ProblemKind::Chloride(metal),
                        T,
                        pressures: self.base_pressures(),
                        argument: ("T".to_string(), T),
                    });
                }
            }
            Task::Task3 => {
                let T = start + ZERO_CELSIUS;
                for carrier in Carrier::iter() {
                    let mut base = carrier.apply(Pressures::chloride_defaults());
                    for (species, p) in &self.pressures {
                        base.set(species, *p);
                    }
                    for i in 0..=METAL_CHLORIDE_PRESSURE {
                        let alcl3 = i as f64;
                        let pressures = base
                            .clone()
                            .with("AlCl3", alcl3)
                            .with("GaCl", (METAL_CHLORIDE_PRESSURE - i) as f64);
                        points.push(ProcessPoint {
                            index: points.len(),
                            group: format!("{}_{}", self.task, carrier.label()),
                            kind: ProblemKind::AlGaN,
                            T,
                            pressures,
                            argument: ("Pg(AlCl3)".to_string(), alcl3),
                        });
                    }
                }
            }
        }
        Ok(points)
    }
}

/// Solve every point in parallel; point i draws its random starts from a generator
/// seeded with seed + i, so results do not depend on the thread schedule
pub fn run_sweep<S>(
    points: &[ProcessPoint],
    seed: u64,
    solve_point: S,
) -> Vec<Result<EquilibriumSolution, EquilibriumError>>
where
    S: Fn(&ProcessPoint, &mut StdRng) -> Result<EquilibriumSolution, EquilibriumError> + Sync,
{
    points
        .par_iter()
        .map(|point| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(point.index as u64));
            solve_point(point, &mut rng)
        })
        .collect()
}

/// Solved points of one output table
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub group: String,
    pub argument: String,
    pub rows: Vec<(f64, EquilibriumSolution)>,
}

impl ResultTable {
    pub fn headers(&self) -> Vec<String> {
        let mut headers = Vec::new();
        if self.argument != "T" {
            headers.push(self.argument.clone());
        }
        if let Some((_, first)) = self.rows.first() {
            headers.extend(first.records().into_iter().map(|(name, _)| name));
        }
        headers
    }

    pub fn values(&self) -> Vec<Vec<f64>> {
        self.rows
            .iter()
            .map(|(argument, solution)| {
                let mut row = Vec::new();
                if self.argument != "T" {
                    row.push(*argument);
                }
                row.extend(solution.records().into_iter().map(|(_, v)| v));
                row
            })
            .collect()
    }
}

/// group solved points by output table, keeping the order of first appearance
pub fn group_results(
    points: &[ProcessPoint],
    solutions: Vec<EquilibriumSolution>,
) -> Vec<ResultTable> {
    let mut tables: Vec<ResultTable> = Vec::new();
    for (point, solution) in points.iter().zip(solutions) {
        match tables.iter_mut().find(|t| t.group == point.group) {
            Some(table) => table.rows.push((point.argument.1, solution)),
            None => tables.push(ResultTable {
                group: point.group.clone(),
                argument: point.argument.0.clone(),
                rows: vec![(point.argument.1, solution)],
            }),
        }
    }
    tables
}

/// Two-column tables: ln|value| against 1/T for the temperature sweeps,
/// value against Pg(AlCl3)/30 for the deposition
pub fn derived_tables(
    task: Task,
    table: &ResultTable,
) -> Vec<(String, Vec<(f64, f64)>, ColumnFormat)> {
    task.derived_values()
        .iter()
        .map(|name| {
            let columns: Vec<(f64, f64)> = table
                .rows
                .iter()
                .filter_map(|(argument, solution)| {
                    let value = solution.value(name)?;
                    Some(match task {
                        Task::Task1 | Task::Task2 => (1.0 / solution.T, value.abs().ln()),
                        Task::Task3 => (argument / METAL_CHLORIDE_PRESSURE as f64, value),
                    })
                })
                .collect();
            let format = match task {
                Task::Task3 => ColumnFormat::Scientific,
                _ => ColumnFormat::Fixed,
            };
            (format!("{}_{}", table.group, name), columns, format)
        })
        .collect()
}

/// Files written by a run, with the solutions in point order
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSummary {
    pub files: Vec<PathBuf>,
    pub solutions: Vec<EquilibriumSolution>,
}

/// Write one CSV per table plus the derived two-column tables
pub fn write_results(
    task: Task,
    tables: &[ResultTable],
    output_dir: &Path,
) -> Result<Vec<PathBuf>, ProcessError> {
    let mut files = Vec::new();
    for table in tables {
        let path = output_dir.join(format!("{}.csv", table.group));
        save_table_to_csv(&path, &table.headers(), &table.values())?;
        files.push(path);
        for (name, columns, format) in derived_tables(task, table) {
            let path = output_dir.join(format!("{}.txt", name));
            save_columns_to_file(&path, &columns, format)?;
            files.push(path);
        }
    }
    Ok(files)
}

/// Sweep with the given point solver, then write the tables
pub fn run_points<S>(
    config: &ProcessConfig,
    points: &[ProcessPoint],
    solve_point: S,
) -> Result<ProcessSummary, ProcessError>
where
    S: Fn(&ProcessPoint, &mut StdRng) -> Result<EquilibriumSolution, EquilibriumError> + Sync,
{
    let begin = Instant::now();
    info!("{}: solving {} points", config.task, points.len());
    let results = run_sweep(points, config.seed, solve_point);
    let mut solutions = Vec::with_capacity(results.len());
    for (point, result) in points.iter().zip(results) {
        match result {
            Ok(solution) => solutions.push(solution),
            Err(error) => {
                error!("{}: {}", point.describe(), error);
                return Err(ProcessError::Equilibrium {
                    point: point.describe(),
                    error,
                });
            }
        }
    }
    let tables = group_results(points, solutions.clone());
    let files = write_results(config.task, &tables, &config.output_dir)?;
    log_statistics(&format!("{} SUMMARY", config.task), sweep_statistics(&solutions, begin.elapsed()));
    Ok(ProcessSummary { files, solutions })
}

fn sweep_statistics(solutions: &[EquilibriumSolution], elapsed: Duration) -> HashMap<String, String> {
    let count = |status: SolveStatus| solutions.iter().filter(|s| s.status == status).count();
    let attempts: usize = solutions.iter().map(|s| s.attempts).sum();
    let (unit, time) = elapsed_time(elapsed);
    let mut stats = HashMap::new();
    stats.insert("points".to_string(), solutions.len().to_string());
    stats.insert("converged".to_string(), count(SolveStatus::Converged).to_string());
    stats.insert("stalled".to_string(), count(SolveStatus::Stalled).to_string());
    stats.insert("exhausted".to_string(), count(SolveStatus::Exhausted).to_string());
    stats.insert("attempts".to_string(), attempts.to_string());
    stats.insert(format!("time elapsed,{}", unit), format!("{:.3}", time));
    stats
}

/// Solve every point of the configured task with the given data bank
pub fn run_task_with_data(
    config: &ProcessConfig,
    data: &ThermoData,
) -> Result<ProcessSummary, ProcessError> {
    let points = config.points()?;
    run_points(config, &points, |point, rng| {
        let mut problem = point.build(data)?;
        problem.set_solver_config(config.solver.clone())?;
        problem.solve(&config.settings, config.delta, rng)
    })
}

/// Load the data bank named in the configuration and run the task
pub fn run_task(config: &ProcessConfig) -> Result<ProcessSummary, ProcessError> {
    let data = ThermoData::from_file(&config.data_bank)?;
    run_task_with_data(config, &data)
}
