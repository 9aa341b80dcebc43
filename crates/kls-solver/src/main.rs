use std::path::Path;
use std::process::ExitCode;

use kls_io::{TimeSeriesWriter, save_restart};
use kls_solver::{ShellSimulation, SimulationConfig};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("usage:");
    eprintln!("  kls-solver run <config.json> <output_dir>");
    eprintln!("  kls-solver default-config <path>");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn write_default_config(path: &Path) -> Result<(), String> {
    SimulationConfig::default()
        .save(path)
        .map_err(|err| format!("{}: {}", path.display(), err))?;
    println!("default configuration written to {}", path.display());
    Ok(())
}

fn run_file(config_path: &Path, output_dir: &Path) -> Result<(), String> {
    let config = SimulationConfig::load(config_path)
        .map_err(|err| format!("{}: {}", config_path.display(), err))?;
    let mut simulation = ShellSimulation::from_config(&config).map_err(|err| err.to_string())?;
    println!(
        "geometry: {} ({} dofs)",
        config.geometry.name(),
        simulation.num_dofs()
    );

    let interval = config.output.interval;
    let mut series = TimeSeriesWriter::new(output_dir, config.output.prefix.as_str());
    if interval > 0 {
        series
            .write_step(simulation.time(), &simulation.control_net(), &simulation.point_data())
            .map_err(|err| err.to_string())?;
    }

    let outcome = simulation.run(config.time.num_steps, |sim, report| {
        if interval > 0 && report.step % interval == 0 {
            series.write_step(report.time, &sim.control_net(), &sim.point_data())?;
        }
        Ok(())
    });

    // Keep the snapshots written before a failure viewable
    if !series.is_empty() {
        let pvd = series.finish().map_err(|err| err.to_string())?;
        println!("time series: {}", pvd.display());
    }
    let reports = outcome.map_err(|err| {
        format!(
            "step {} failed at t = {:e}: {}",
            simulation.steps_taken() + 1,
            simulation.time(),
            err
        )
    })?;

    if config.output.write_restart {
        let path = output_dir.join(format!("{}_restart.json", config.output.prefix));
        save_restart(&path, &simulation.restart_state()).map_err(|err| err.to_string())?;
        println!("restart: {}", path.display());
    }

    let iterations: usize = reports.iter().map(|r| r.newton.iterations).sum();
    println!("steps: {}", reports.len());
    println!("final_time: {:e}", simulation.time());
    println!("newton_iterations: {}", iterations);
    if let Some(last) = reports.last() {
        println!("elastic_energy: {:e}", last.elastic_energy);
        println!("kinetic_energy: {:e}", last.kinetic_energy);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("run") if args.len() == 4 => {
            init_tracing();
            match run_file(Path::new(&args[2]), Path::new(&args[3])) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("run_error: {err}");
                    ExitCode::from(1)
                }
            }
        }
        Some("default-config") if args.len() == 3 => {
            match write_default_config(Path::new(&args[2])) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("config_error: {err}");
                    ExitCode::from(1)
                }
            }
        }
        _ => {
            usage();
            ExitCode::from(2)
        }
    }
}
