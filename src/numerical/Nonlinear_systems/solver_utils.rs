use log::{debug, info};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tabled::{builder::Builder, settings::Style};

/// pick a readable unit for a duration
pub fn elapsed_time(elapsed: Duration) -> (String, f64) {
    let time = elapsed.as_millis();
    if time < 1000 {
        (" ms".to_string(), elapsed.as_secs_f64() * 1000.0)
    } else if time < 60_000 {
        (" s".to_string(), elapsed.as_secs_f64())
    } else if time < 3600_000 {
        (" min".to_string(), elapsed.as_secs_f64() / 60.0)
    } else {
        (" h".to_string(), elapsed.as_secs_f64() / 3600.0)
    }
}

/// Time spent in the parts of one solve
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timings {
    pub total: Duration,
    pub jac: Duration,
    pub fun: Duration,
    pub linear_system: Duration,
    pub line_search: Duration,
}

impl Timings {
    pub fn get_all(&self) -> HashMap<String, String> {
        let mut timer_data: HashMap<String, String> = HashMap::new();
        let total_time = self.total.as_nanos() as f64;
        let (unit, value) = elapsed_time(self.total);
        timer_data.insert(
            "time elapsed,".to_string() + unit.as_str(),
            format!("{:.3}", value),
        );
        if total_time == 0.0 {
            return timer_data;
        }
        let parts = [
            ("Jacobian", self.jac),
            ("Function", self.fun),
            ("Linear System", self.linear_system),
            ("Line Search", self.line_search),
        ];
        let mut other = total_time;
        for (name, part) in parts {
            let part_ns = part.as_nanos() as f64;
            other -= part_ns;
            let percent = 100.0 * part_ns / total_time;
            if percent > 0.5 {
                let (unit, value) = elapsed_time(part);
                timer_data.insert(
                    format!("{} (%,{})", name, unit),
                    format!("{:.3}, {:.3}", percent, value),
                );
            }
        }
        let other_percent = 100.0 * other / total_time;
        if other_percent > 0.5 {
            timer_data.insert("other %".to_string(), format!("{:.3}", other_percent));
        }
        timer_data
    }
}

/// tic/tac accumulator for the phases of an iteration
#[derive(Debug, Clone)]
pub struct CustomTimer {
    start: Instant,
    jac_time: Instant,
    fun_time: Instant,
    linear_system_time: Instant,
    line_search_time: Instant,
    timings: Timings,
}

impl CustomTimer {
    pub fn new() -> CustomTimer {
        let now = Instant::now();
        CustomTimer {
            start: now,
            jac_time: now,
            fun_time: now,
            linear_system_time: now,
            line_search_time: now,
            timings: Timings::default(),
        }
    }
    pub fn jac_tic(&mut self) {
        self.jac_time = Instant::now();
    }
    pub fn jac_tac(&mut self) {
        self.timings.jac += self.jac_time.elapsed();
    }
    pub fn fun_tic(&mut self) {
        self.fun_time = Instant::now();
    }
    pub fn fun_tac(&mut self) {
        self.timings.fun += self.fun_time.elapsed();
    }
    pub fn linear_system_tic(&mut self) {
        self.linear_system_time = Instant::now();
    }
    pub fn linear_system_tac(&mut self) {
        self.timings.linear_system += self.linear_system_time.elapsed();
    }
    pub fn line_search_tic(&mut self) {
        self.line_search_time = Instant::now();
    }
    pub fn line_search_tac(&mut self) {
        self.timings.line_search += self.line_search_time.elapsed();
    }
    /// snapshot with the total measured from construction
    pub fn get_timings(&self) -> Timings {
        let mut timings = self.timings;
        timings.total = self.start.elapsed();
        debug!("solver timings: {:?}", timings);
        timings
    }
}

impl Default for CustomTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// render a key/value map as a rounded table
pub fn statistics_table(stats: HashMap<String, String>) -> String {
    let mut table = Builder::from(stats).build();
    table.with(Style::modern_rounded());
    table.to_string()
}

pub fn log_statistics(title: &str, stats: HashMap<String, String>) {
    info!("\n \n {} \n \n {}", title, statistics_table(stats));
}
