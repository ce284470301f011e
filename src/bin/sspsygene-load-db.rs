extern crate sspsygene;

use std::env;
use std::fs::File;
use std::process;
use std::sync::Mutex;

use anyhow::Context;
use getopts::Options;
use tracing_subscriber::EnvFilter;

use sspsygene::config::Config;
use sspsygene::constants::CONFIG_JSON_ENV_VAR;
use sspsygene::pipeline;

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]\n\n\
                         Reads the pipeline configuration from the JSON file named by ${}",
                        program, CONFIG_JSON_ENV_VAR);
    print!("{}", opts.usage(&brief));
}

fn init_logging(log_level: &str, log_file: Option<String>) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("sspsygene={}", log_level)))
        .with_context(|| format!("invalid log level: {}", log_level))?;

    if let Some(log_file) = log_file {
        let file = File::create(&log_file)
            .with_context(|| format!("can't open log file {}", log_file))?;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    println!("{} v{}", PKG_NAME, VERSION);

    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();

    opts.optflag("h", "help", "print this help message");
    opts.optopt("", "log-level",
                "log level when RUST_LOG isn't set: error, warn, info, debug or trace (default: info)",
                "LEVEL");
    opts.optopt("", "log-file", "write log messages to this file instead of stderr", "FILE");

    let program = args[0].clone();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            print_usage(&program, &opts);
            println!("\nerror: {}", e);
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        print_usage(&program, &opts);
        process::exit(0);
    }

    if !matches.free.is_empty() {
        println!("unexpected arguments: {}", matches.free.join(" "));
        print_usage(&program, &opts);
        process::exit(1);
    }

    let log_level = matches.opt_str("log-level").unwrap_or_else(|| "info".to_owned());
    init_logging(&log_level, matches.opt_str("log-file"))?;

    let config = Config::from_env()?;

    match pipeline::run(&config) {
        Ok(report) => {
            print!("{}", report);
            Ok(())
        },
        Err(err) => {
            eprintln!("build failed, {} not replaced: {}", config.output_db_path().display(), err);
            process::exit(1);
        }
    }
}
