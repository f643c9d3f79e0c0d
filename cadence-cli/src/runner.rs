use std::{io, path::Path, thread::sleep, time::Duration};

use cadence_lib::{
    catalog::{load_catalog, Catalog, TrackId},
    engine::RodioEngine,
    error::{PlaybackError, Result},
    playback::{Transport, TransportSettings},
};
use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::{controls, logging, ui};

pub fn run(args: &ArgMatches, log_buffer: logging::LogBuffer) -> Result<i32> {
    info!("Starting Cadence");

    if let Some(("list", sub)) = args.subcommand() {
        return list(sub);
    }

    let library = args
        .get_one::<String>("LIBRARY")
        .ok_or_else(|| PlaybackError::Library("no library directory given".to_string()))?;
    let catalog = load_catalog(Path::new(library))?;
    if catalog.is_empty() {
        println!("No playable tracks in {}", library);
        return Ok(0);
    }

    let settings = settings_from_args(args);
    let engine = RodioEngine::new(None)?;
    let transport = Transport::new(catalog, Box::new(engine), settings);

    let started = if let Some(start) = args.get_one::<String>("start") {
        transport.play(&TrackId::from(start.as_str()))
    } else if args.get_flag("no-autoplay") {
        Ok(())
    } else {
        transport.autoplay()
    };
    if let Err(err) = started {
        transport.shutdown();
        return Err(err);
    }

    let code = play_loop(&transport, args.get_flag("quiet"), log_buffer);
    transport.shutdown();
    Ok(code)
}

fn settings_from_args(args: &ArgMatches) -> TransportSettings {
    let mut settings = TransportSettings::default();
    if let Some(ms) = args.get_one::<u64>("progress-ms") {
        settings = settings.with_progress_interval(Duration::from_millis(*ms));
    }
    if let Some(delays) = args.get_many::<u64>("settle-ms") {
        settings = settings
            .with_speed_settle_delays(delays.map(|ms| Duration::from_millis(*ms)).collect());
    }
    settings
}

fn list(args: &ArgMatches) -> Result<i32> {
    let library = args
        .get_one::<String>("LIBRARY")
        .ok_or_else(|| PlaybackError::Library("no library directory given".to_string()))?;
    let catalog = load_catalog(Path::new(library))?;

    if args.get_flag("json") {
        let json = serde_json::to_string_pretty(catalog.tracks())
            .map_err(|err| PlaybackError::Library(err.to_string()))?;
        println!("{}", json);
    } else {
        print!("{}", render_list(&catalog));
    }
    Ok(0)
}

fn render_list(catalog: &Catalog) -> String {
    catalog
        .tracks()
        .iter()
        .enumerate()
        .map(|(index, track)| {
            format!(
                "{:>3}. {}  [{}]  {:.1}x\n",
                index + 1,
                track.display_name,
                track.id,
                track.speed
            )
        })
        .collect()
}

fn play_loop(transport: &Transport, quiet: bool, log_buffer: logging::LogBuffer) -> i32 {
    let _raw_mode = RawModeGuard::enable().ok();
    let mut terminal = if !quiet {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    } else {
        None
    };
    let _stderr_capture = terminal
        .as_ref()
        .and_then(|_| logging::capture_stderr(log_buffer.clone()));

    let mut cursor = controls::Cursor::default();
    let mut last_selected: Option<TrackId> = None;

    loop {
        let status = transport.current_status();

        // Follow the playing track with the cursor whenever it changes.
        if status.selected != last_selected {
            if let Some(index) = status
                .selected
                .as_ref()
                .and_then(|id| transport.catalog().index_of(id))
            {
                cursor.index = index;
            }
            last_selected = status.selected.clone();
        }

        if let Some(term) = terminal.as_mut() {
            let log_lines = logging::snapshot(&log_buffer);
            let snapshot = controls::status_text(&status);
            ui::draw(
                term,
                &ui::View {
                    tracks: transport.list_tracks(),
                    selected: status.selected.as_ref(),
                    cursor: cursor.index,
                    status: &snapshot,
                    log_lines: &log_lines,
                },
            );
        }

        if !controls::handle_key_event(transport, &mut cursor) {
            break;
        }

        sleep(Duration::from_millis(50));
    }

    // Restore the terminal state before exiting.
    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        if execute!(stdout, LeaveAlternateScreen, cursor::Show).is_err() {
            warn!("failed to restore the terminal");
        }
    }

    0
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_lib::catalog::TrackDescriptor;

    #[test]
    fn list_shows_order_id_and_speed() {
        let catalog = Catalog::new(vec![
            TrackDescriptor::new("001.mp3", "Opening", "/lib/001.mp3", 2.0),
            TrackDescriptor::new("030.mp3", "Middle", "/lib/030.mp3", 1.5),
        ])
        .expect("catalog");

        assert_eq!(
            render_list(&catalog),
            "  1. Opening  [001.mp3]  2.0x\n  2. Middle  [030.mp3]  1.5x\n"
        );
    }

    #[test]
    fn settle_delays_come_from_args() {
        let args = crate::cli::args::build_cli()
            .try_get_matches_from(["cadence", "lib", "--settle-ms", "40", "--progress-ms", "250"])
            .expect("parse");

        let settings = settings_from_args(&args);

        assert_eq!(settings.speed_settle_delays, vec![Duration::from_millis(40)]);
        assert_eq!(settings.progress_interval, Duration::from_millis(250));
    }
}
