// ============================================================================
// main.rs — Shapemorph
// Entry point. Parses the command line, initializes logging and runs either
// the windowed event loop or the headless renderer.
// ============================================================================

mod animation;
mod app;
mod backend;
mod backing;
mod config;
mod driver;
mod error;
mod gpu;
mod headless;
mod pipeline;
mod uniforms;

use std::process::ExitCode;

use clap::Parser;
use winit::event_loop::EventLoop;

use app::App;
use config::Cli;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match cli.morph_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("shapemorph: {err}");
            return ExitCode::from(2);
        }
    };

    if cli.headless {
        return match headless::run_headless(&config, &cli.headless_config()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                log::error!("Headless run failed: {}", err);
                eprintln!("shapemorph: {err}");
                ExitCode::FAILURE
            }
        };
    }

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            eprintln!("shapemorph: failed to create event loop: {err}");
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = App::new(config);
    if let Err(err) = event_loop.run_app(&mut app) {
        eprintln!("shapemorph: event loop terminated: {err}");
        return ExitCode::FAILURE;
    }

    match app.finish() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("shapemorph: {err}");
            ExitCode::FAILURE
        }
    }
}
