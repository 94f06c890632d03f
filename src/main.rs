use std::{path::Path, process, sync::mpsc};

use tailscribe::{
    args::parse_args_with_clap,
    error::Result,
    events::ReaderEvent,
    overflow::FileOverflow,
    reader::LogReader,
    settings::Settings,
    summary::LabelCounts,
    tail::is_file_in_use,
    template_set::TemplateSet,
};

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = match parse_args_with_clap(std::env::args().collect()) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };

    let mut settings = match Settings::new() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Could not load settings: {}", err);
            process::exit(1);
        }
    };
    settings.apply_args(&args);

    if let Err(err) = run(&settings) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run(settings: &Settings) -> Result<()> {
    let logfile = Path::new(&settings.logfile);
    if is_file_in_use(logfile) {
        log::warn!(
            "{} is held by another process, reading anyway",
            logfile.display()
        );
    }

    // Templates are checked before anything is read.
    let templates = TemplateSet::from_yaml_file(Path::new(&settings.templates))?;
    log::info!(
        "Loaded {} templates from {}",
        templates.len(),
        settings.templates
    );
    let overflow = FileOverflow::create(Path::new(&settings.overflow))?;

    let (tx, rx) = mpsc::channel();
    let reader = LogReader::start(
        logfile,
        templates.clone(),
        overflow,
        settings.reader_options(),
        tx,
    )?;

    let mut counts = LabelCounts::default();
    for event in rx {
        match event {
            ReaderEvent::EntryCompleted(entry) => counts.record(&entry),
            ReaderEvent::Idle => println!("{}\n", counts.summary(&templates)),
        }
    }

    // The channel only closes when the reader thread is gone.
    reader.wait()
}
