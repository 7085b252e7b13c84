//! `taskhelm plans` — list saved plan files.

use taskhelm_config::AppConfig;
use taskhelm_planner::list_plan_files;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let paths = list_plan_files(&config.planner.plans_dir);

    if paths.is_empty() {
        println!("No plans found in {}.", config.planner.plans_dir.display());
        return Ok(());
    }
    for path in paths {
        println!("{path}");
    }
    Ok(())
}
