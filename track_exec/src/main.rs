//! Main tracking executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Initialise the vehicle link, dispatcher and TrackCtrl
//!     - Start the video stream and the safety monitor thread
//!     - Main loop:
//!         - Shell command processing (script or console)
//!         - Frame processing:
//!             - Frame acquisition
//!             - Target detection
//!             - Tracking control processing
//!             - Velocity command dispatch
//!     - Once landing starts frame processing stops, while shell commands
//!       and the safety monitor keep running until exit
//!     - Shutdown: stop the monitor, let in-flight commands finish
//!
//! # Usage
//!
//! `track_exec [script]`: with a script path commands are read from the
//! script, otherwise from the interactive console.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use link_if::{shell::ShellCmd, Command, CommandChannel, FrameSource, VehicleStatus};
use track_lib::{
    console::Console,
    control_handle::ControlHandle,
    detector::BlobDetector,
    dispatch::{DispatchOutcome, Dispatcher},
    params::TrackExecParams,
    pipeline::{FramePipeline, TickOutcome},
    safety::{LandedLatch, SafetyMonitor},
    shell_processor::{ShellAction, ShellProcessor},
    track_ctrl::TrackCtrl,
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingCmds, ScriptInterpreter},
    session::Session,
};

#[cfg(feature = "sim")]
use track_lib::sim_vehicle::{SimParams, SimVehicle};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive cycle overruns after which a warning is repeated.
const OVERRUN_WARN_INTERVAL: u64 = 100;

/// Extra time allowed for in-flight commands on shutdown, on top of a full
/// retry sequence.
const DRAIN_MARGIN: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Sources of shell commands for the exec.
enum CmdSource {
    Console(Console),
    Script(ScriptInterpreter),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("track_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("QuadTrack Tracking Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: TrackExecParams =
        util::params::load("track_exec.toml").wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE COMMAND SOURCE ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let cmd_source = match args.len() {
        // If we have a single argument use it as the script path
        2 => {
            info!("Loading script from \"{}\"", &args[1]);

            let si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} commands\n",
                si.get_duration(),
                si.get_num_cmds()
            );

            CmdSource::Script(si)
        }
        1 => {
            info!("No script provided, commands will be read from the console\n");
            CmdSource::Console(Console::start().wrap_err("Failed to start the console")?)
        }
        n => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                n - 1
            ))
        }
    };

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut track_ctrl = TrackCtrl::default();
    track_ctrl
        .init(exec_params.track_ctrl_params.clone(), &session)
        .wrap_err("Failed to initialise TrackCtrl")?;
    info!("TrackCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE VEHICLE LINK ----

    run_with_vehicle(track_ctrl, cmd_source, &exec_params)
}

/// Create the simulated vehicle and run against it.
#[cfg(feature = "sim")]
fn run_with_vehicle(
    track_ctrl: TrackCtrl,
    cmd_source: CmdSource,
    exec_params: &TrackExecParams,
) -> Result<(), Report> {
    let sim_params: SimParams =
        util::params::load("sim_vehicle.toml").wrap_err("Could not load sim params")?;
    let vehicle = Arc::new(SimVehicle::new(sim_params));
    info!("Simulated vehicle initialised");

    run(vehicle, track_ctrl, cmd_source, exec_params)
}

#[cfg(not(feature = "sim"))]
fn run_with_vehicle(
    _track_ctrl: TrackCtrl,
    _cmd_source: CmdSource,
    _exec_params: &TrackExecParams,
) -> Result<(), Report> {
    Err(eyre!(
        "No vehicle link is available in this build, enable the \"sim\" feature"
    ))
}

/// Run the executable against the given vehicle link until exit or landing.
#[cfg_attr(not(feature = "sim"), allow(dead_code))]
fn run<V>(
    vehicle: Arc<V>,
    track_ctrl: TrackCtrl,
    mut cmd_source: CmdSource,
    exec_params: &TrackExecParams,
) -> Result<(), Report>
where
    V: CommandChannel + VehicleStatus + FrameSource + 'static,
{
    let retry_params = exec_params.retry_params();
    let latch = LandedLatch::new();
    let dispatcher = Dispatcher::new(vehicle.clone(), latch.clone(), retry_params);

    // ---- START VIDEO ----

    // Without the stream there is nothing to track, so this is fatal
    match dispatcher.dispatch(Command::StreamOn).wait() {
        DispatchOutcome::Acked { attempts } => {
            info!("Video stream started ({} attempt(s))", attempts)
        }
        o => return Err(eyre!("Could not start the video stream: {:?}", o)),
    }

    // ---- START SAFETY MONITOR ----

    let monitor = SafetyMonitor::new(
        vehicle.clone(),
        dispatcher.clone(),
        exec_params.critical_battery_pct,
        exec_params.battery_period(),
    );
    let handle = ControlHandle::new(latch, monitor.battery_reading());
    let monitor_handle = monitor
        .spawn()
        .wrap_err("Failed to start the safety monitor")?;

    // ---- BUILD PIPELINE ----

    let detector = BlobDetector::new(
        exec_params.detector_threshold,
        exec_params.detector_min_pixels,
    );
    let mut pipeline = FramePipeline::new(
        vehicle,
        Box::new(detector),
        track_ctrl,
        dispatcher.clone(),
        handle.clone(),
    );
    let shell = ShellProcessor::new(dispatcher.clone(), handle, exec_params);

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let cycle_period = exec_params.frame_period();
    let mut num_consec_cycle_overruns: u64 = 0;
    let mut num_cycles: u64 = 0;
    let mut pipeline_stopped = false;

    'main: loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- SHELL COMMAND PROCESSING ----

        let cmds = match cmd_source {
            CmdSource::Console(ref console) => console.pending_cmds(),
            CmdSource::Script(ref mut si) => match si.get_pending_cmds() {
                PendingCmds::None => vec![],
                PendingCmds::Some(cmds) => cmds,
                // Exit (and land) at the end of the script
                PendingCmds::EndOfScript => {
                    info!("End of script reached, exiting");
                    vec![ShellCmd::Exit]
                }
            },
        };

        for cmd in cmds.iter() {
            debug!("Shell command: {:?}", cmd);
            if shell.exec(cmd) == ShellAction::Exit {
                break 'main;
            }
        }

        // ---- FRAME PROCESSING ----

        if !pipeline_stopped {
            match pipeline.tick() {
                Ok(TickOutcome::Stopped) => {
                    info!("Vehicle is landing, frame processing stopped. Use \"exit\" to quit");
                    pipeline_stopped = true;
                }
                Ok(TickOutcome::NoFrame) | Ok(TickOutcome::WrongFrameSize { .. }) => (),
                Ok(TickOutcome::Dispatched(cmd)) => {
                    if num_cycles % 20 == 0 {
                        debug!("Command: {:?}", cmd);
                    }
                }
                Err(e) => warn!("Error during frame processing: {}", e),
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                if num_consec_cycle_overruns % OVERRUN_WARN_INTERVAL == 0 {
                    warn!(
                        "Cycle overran by {:.06} s",
                        cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                    );
                }
                num_consec_cycle_overruns += 1;
            }
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    monitor_handle.stop();

    let drain_timeout = retry_params.backoff * retry_params.max_retries + DRAIN_MARGIN;
    let abandoned = dispatcher.drain(drain_timeout);
    if abandoned > 0 {
        warn!("Abandoning {} command(s) still being sent", abandoned);
    }

    info!("Dispatch statistics: {:?}", dispatcher.stats());
    info!("End of execution after {} cycles", num_cycles);

    Ok(())
}
