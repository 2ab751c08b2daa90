use std::path::PathBuf;

use anyhow::Result;

pub fn check(file: Option<PathBuf>) -> Result<()> {
    let (path, config) = super::load(file)?;

    println!("{} is valid", path.display());
    for (name, process) in &config.processes {
        println!(
            "  {name}: {} (startup delay {}ms)",
            process.display_command(),
            process.effective_startup_delay().as_millis()
        );
    }
    if let Some(sink) = &config.log_sink {
        println!("  log sink: {}", sink.url);
    }

    Ok(())
}
