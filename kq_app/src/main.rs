//! Tile demo
//!
//! Opens the renderer window and draws two textured quads side by side until
//! the window is closed (or Escape is pressed).

use kq_engine::core::{ApplicationConfig, Config};
use kq_engine::foundation::logging;
use kq_engine::render::{Session, VulkanError};
use std::time::{Duration, Instant};

const CONFIG_PATH: &str = "kq.toml";
const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApplicationConfig::load_or_default(CONFIG_PATH)?;
    logging::init_with_level(logging::parse_level(&config.engine.log_level));

    log::info!("Starting kq tile demo");
    let mut session = Session::open(&config)?;

    let result = run(&mut session);
    session.stop();

    match result {
        Ok(()) | Err(VulkanError::WindowClosed) => {
            log::info!("Tile demo finished");
            Ok(())
        }
        Err(e) => {
            log::error!("Render loop failed: {}", e);
            Err(e.into())
        }
    }
}

fn run(session: &mut Session<kq_engine::render::GlfwWindow>) -> Result<(), VulkanError> {
    let mut last_report = Instant::now();

    while !session.should_close() {
        session.poll_events();

        session.render_begin()?;
        session.draw_quad([-0.5, 0.0], [1.0, 1.0], 0)?;
        session.draw_quad([0.5, 0.0], [1.0, 1.0], 1)?;
        session.render_end()?;

        if last_report.elapsed() >= FPS_REPORT_INTERVAL {
            let timer = session.timer();
            log::debug!(
                "{:.1} fps average, last frame {:.2} ms",
                timer.average_fps(),
                timer.delta_time() * 1000.0
            );
            last_report = Instant::now();
        }
    }
    Ok(())
}
