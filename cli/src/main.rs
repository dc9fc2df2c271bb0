use anyhow::Context;
use clap::Parser;
use gui::core::gui::RaceView;
use plotters::prelude::*;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;
use trainsim::core::handle_race::handle_race;
use trainsim::core::track::{Track, UNREACHABLE};
use trainsim::interfaces::gui_interface::gui_channels;
use trainsim::post::race_result::RaceResult;
use trainsim::pre::read_sim_pars::{read_sim_pars, SimPars};
use trainsim::pre::sim_opts::SimOpts;

/// export_score_plot draws the score of every player over the turns into output/.
fn export_score_plot(result: &RaceResult) -> anyhow::Result<String> {
    let out_dir = Path::new("output");
    std::fs::create_dir_all(out_dir).context("Failed to create output directory!")?;
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before 1970!")?
        .as_secs();
    let out_path = out_dir.join(format!("score_plot_{}.png", ts));

    let y_max = result
        .score_logs
        .iter()
        .flat_map(|log| log.iter().map(|&(_, score)| score))
        .filter(|&score| score != UNREACHABLE)
        .max()
        .unwrap_or(1)
        .max(1) as f64;
    let x_max = result.turns.max(1) as u32;

    let root = BitMapBackend::new(&out_path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!(
                "Distance to finish, track {}, generation {}",
                result.track_name, result.generation
            ),
            ("sans-serif", 24).into_font(),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0u32..x_max, 0.0..y_max * 1.05)?;

    chart
        .configure_mesh()
        .x_desc("Turn")
        .y_desc("Score (px)")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    let palette = Palette99::pick;
    for (i, (player_result, score_log)) in result
        .player_results
        .iter()
        .zip(result.score_logs.iter())
        .enumerate()
    {
        let series: Vec<(u32, f64)> = score_log
            .iter()
            .filter(|&&(_, score)| score != UNREACHABLE)
            .map(|&(turn, score)| (turn as u32, score as f64))
            .collect();

        chart
            .draw_series(LineSeries::new(series.into_iter(), palette(i)))?
            .label(format!("{} ({})", player_result.id, player_result.name))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], palette(i)));
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", 16))
        .position(plotters::chart::SeriesLabelPosition::UpperRight)
        .draw()?;

    root.present()?;
    Ok(out_path.to_string_lossy().into_owned())
}

/// report prints the results and exports them if requested.
fn report(race_result: &RaceResult, export: bool) -> anyhow::Result<()> {
    race_result.print_results()?;

    if export {
        let csv_path = race_result.write_results_to_csv(None)?;
        tracing::info!("Results written to {}", csv_path.display());

        match export_score_plot(race_result) {
            Ok(path) => tracing::info!("Score plot written to {}", path),
            Err(e) => tracing::warn!("Could not write score plot: {:#}", e),
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    let default_filter = if sim_opts.debug {
        "trainsim=debug,gui=debug,cli=debug"
    } else {
        "trainsim=info,gui=info,cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    sim_opts.validate()?;

    // get simulation parameters
    let mut sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        tracing::info!("Reading simulation parameters from {}", parfile_path.display());
        read_sim_pars(parfile_path)?
    } else {
        tracing::info!("No parameter file given, racing one human against two AI players");
        SimPars::default_race("default")
    };
    sim_opts.apply_overrides(&mut sim_pars);
    sim_pars.validate()?;

    let track = Arc::new(
        Track::load(&sim_opts.tracks_dir, &sim_pars.race_pars.track_name)
            .context("Failed to load track!")?,
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if sim_opts.headless && sim_opts.no_sim_runs == 1 {
        tracing::info!("Running headless...");
        let t_start = Instant::now();

        let race_result = handle_race(&sim_pars, track, None, sim_opts.realtime_factor)?;

        tracing::info!("Execution time: {}ms", t_start.elapsed().as_millis());
        report(&race_result, sim_opts.export)?;
    } else if sim_opts.headless {
        tracing::info!(
            "Running {} headless runs in parallel...",
            sim_opts.no_sim_runs
        );
        let t_start = Instant::now();

        // every run gets its own seed, the track is shared
        let race_results: Vec<RaceResult> = (0..sim_opts.no_sim_runs as u64)
            .into_par_iter()
            .map(|run| {
                let mut sim_pars_run = sim_pars.clone();
                sim_pars_run.race_pars.seed += run;
                handle_race(
                    &sim_pars_run,
                    Arc::clone(&track),
                    None,
                    sim_opts.realtime_factor,
                )
            })
            .collect::<anyhow::Result<Vec<RaceResult>>>()?;

        tracing::info!("Execution time: {}ms", t_start.elapsed().as_millis());

        for (run, race_result) in race_results.iter().enumerate() {
            let best = race_result
                .ranking()
                .first()
                .map(|&idx| &race_result.player_results[idx]);
            if let Some(best) = best {
                println!(
                    "RESULT: Run {:3} (seed {}), {} turns, best player {} ({}) with score {}",
                    run + 1,
                    sim_pars.race_pars.seed + run as u64,
                    race_result.turns,
                    best.id,
                    best.name,
                    best.score
                );
            }
        }
    } else {
        tracing::info!("Starting GUI...");

        // create the channels between GUI and engine
        let (gui_link, tx_event, rx_state) = gui_channels();

        // run the engine in a separate thread, the GUI must run in the main thread
        let sim_pars_thread = sim_pars.clone();
        let track_thread = Arc::clone(&track);
        let realtime_factor = sim_opts.realtime_factor;
        let export = sim_opts.export;

        let _ = thread::spawn(move || {
            let outcome = handle_race(&sim_pars_thread, track_thread, Some(gui_link), realtime_factor)
                .and_then(|race_result| report(&race_result, export));

            if let Err(e) = outcome {
                tracing::error!("{:#}", e);
            }
        });

        let gui = RaceView::new(rx_state, tx_event, track);
        let native_options = eframe::NativeOptions {
            initial_window_size: Some(eframe::egui::Vec2::new(1280.0, 720.0)),
            ..eframe::NativeOptions::default()
        };
        eframe::run_native(Box::new(gui), native_options);
    }

    Ok(())
}
