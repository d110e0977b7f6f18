use clap::Parser;
use playmidi::{
    app::{exit_code, install_interrupt_handler, invocation, list_devices, Invocation, BANNER},
    cli::{format_device_list, program_name, prompt_for_device, usage, Args},
    config::Settings,
    logging,
    midi::{DefaultSequenceService, MidiError},
    run,
    ui::{BarProgress, LineProgress, ProgressReporter},
    PlayRequest,
};

fn main() {
    let args = parse_command_line_arguments();
    println!("{}", BANNER);

    let file = match invocation(&args) {
        Invocation::Usage => {
            println!("{}", usage(&program_name()));
            return;
        }
        Invocation::ListDevices => None,
        Invocation::Play(file) => Some(file),
    };

    let settings = load_settings(&args);
    initialize_logging(&settings);

    let mut service = DefaultSequenceService::new(&settings.client_name, settings.synth_gain);

    let Some(file) = file else {
        list_available_devices(&service);
        return;
    };

    let device_index = resolve_device_index(&args, &service);
    let request = PlayRequest {
        file,
        device_index,
        tempo: args.tempo,
    };

    let interrupted = install_interrupt_handler();
    let mut progress = create_progress(&args);

    match run(
        &mut service,
        &request,
        &settings.poll_settings(),
        progress.as_mut(),
        &interrupted,
    ) {
        Ok(summary) => {
            log::info!(
                "Finished {} at {:.6} ({} polls)",
                request.file.display(),
                summary.final_time,
                summary.polls
            );
        }
        Err(e) => exit_with_error(&e),
    }
}

fn parse_command_line_arguments() -> Args {
    Args::parse()
}

fn load_settings(args: &Args) -> Settings {
    match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            std::process::exit(1);
        }
    }
}

fn initialize_logging(settings: &Settings) {
    if let Err(e) = logging::init_logger(settings.log_level) {
        eprintln!("Log file unavailable ({}); logging to stderr", e);
    }
    log::info!("Application starting");
}

fn list_available_devices(service: &DefaultSequenceService) {
    match list_devices(service) {
        Ok(names) => {
            println!("Available MIDI output destinations:");
            for line in format_device_list(&names) {
                println!("{}", line);
            }
        }
        Err(e) => exit_with_error(&e),
    }
}

fn resolve_device_index(args: &Args, service: &DefaultSequenceService) -> Option<usize> {
    if args.device_number.is_some() || !args.select_device {
        return args.device_number;
    }
    let chosen = list_devices(service).and_then(|names| prompt_for_device(&names));
    match chosen {
        Ok(index) => index,
        Err(e) => exit_with_error(&e),
    }
}

fn create_progress(args: &Args) -> Box<dyn ProgressReporter> {
    if args.progress_bar {
        Box::new(BarProgress::new())
    } else {
        Box::new(LineProgress::stdout())
    }
}

fn exit_with_error(error: &MidiError) -> ! {
    log::error!("{}", error);
    eprintln!("Error: {}", error);
    std::process::exit(exit_code(error));
}
