use chordnode::config::{Cli, Command, NodeConfig};
use clap::Parser;
use std::fs::OpenOptions;
use std::process;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let Command::RunNode(args) = cli.command;
    let config = NodeConfig::from_args(args);

    if let Err(err) = chordnode::run(config) {
        log::error!("application error: {}", err);
        process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let level = chordnode::config::log_level_for(cli.verbosity);
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level);

    dispatch = if cli.log_file == "-" {
        dispatch.chain(std::io::stderr())
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cli.log_file)
            .unwrap_or_else(|err| {
                eprintln!("could not open log file {}: {}", cli.log_file, err);
                process::exit(2);
            });
        dispatch.chain(file)
    };

    dispatch.apply().expect("logging can only be initialized once");
}
