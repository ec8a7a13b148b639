//! Scheduler listing command

use latentloop_scheduler::{SchedulerConfig, SchedulerRegistry};

pub fn run() {
    let registry = SchedulerRegistry::default();
    let defaults = SchedulerConfig::default();

    println!("Available Schedulers");
    println!("====================\n");

    for kind in registry.available() {
        println!("  {:<8} {}", kind.name(), kind.description());
    }

    println!();
    println!("Training curve defaults:");
    println!("  Steps:    {}", defaults.num_train_steps);
    println!("  Betas:    {} .. {}", defaults.beta_start, defaults.beta_end);
    println!("  Schedule: {:?}", defaults.beta_schedule);
}
