#![allow(non_snake_case)]
use RustedEquilibria::Examples::nonlinear_eqs_examples::nonlinear_examples;
use RustedEquilibria::Utils::logger::init_logger;
use RustedEquilibria::Utils::task_parser::TaskDocument;
use RustedEquilibria::chemistry::process::{ProcessConfig, ProcessError, Task, run_task};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "usage:
  RustedEquilibria example <n>     run demo n (0: Newton vs universal, 1: trigonometric system, 2: line searches)
  RustedEquilibria task <file>     run the process described by a task file
  RustedEquilibria <task1|task2|task3> [data bank]   run a process with default settings";

fn run_process(config: &ProcessConfig) -> ExitCode {
    if let Err(e) = fs::create_dir_all(&config.output_dir) {
        eprintln!("cannot create {}: {}", config.output_dir.display(), e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = init_logger(config.loglevel.as_deref(), Some(&config.output_dir)) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    match run_task(config) {
        Ok(summary) => {
            for file in summary.files {
                println!("{}", file.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.iter().map(|s| s.as_str()).collect::<Vec<_>>().as_slice() {
        ["example", n] => match n.parse::<usize>() {
            Ok(n) => {
                let _ = init_logger(Some("warn"), None);
                nonlinear_examples(n);
                ExitCode::SUCCESS
            }
            Err(_) => {
                eprintln!("{}", USAGE);
                ExitCode::FAILURE
            }
        },
        ["task", file] => {
            let config = TaskDocument::from_file(Path::new(file))
                .map_err(ProcessError::from)
                .and_then(|task| ProcessConfig::from_task(&task));
            match config {
                Ok(config) => run_process(&config),
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        [name, rest @ ..] if Task::from_name(name).is_ok() && rest.len() <= 1 => {
            let mut config = ProcessConfig::default();
            if let Ok(task) = Task::from_name(name) {
                config.task = task;
            }
            if let [bank] = rest {
                config.data_bank = PathBuf::from(bank);
            }
            run_process(&config)
        }
        [] => {
            println!("{}", USAGE);
            nonlinear_examples(0);
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("{}", USAGE);
            ExitCode::FAILURE
        }
    }
}
