use clap::ErrorKind;
use shaderbake_core::prelude::*;
use std::{env, io, process};

fn main() {
    let options = match Options::parse(env!("CARGO_PKG_VERSION"), env::args_os()) {
        Ok(options) => options,
        Err(err) => match err.kind.clone() {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => err.exit(),
            _ => {
                eprintln!("{}", err.message);
                process::exit(2);
            }
        },
    };

    if let Err(err) = Logger::init(!options.no_color, options.log_level()) {
        eprintln!("{}", err);
        process::exit(2);
    }

    let bake = ShaderBake::new(&options).unwrap_or_log("Init");
    let report = bake.run(&mut io::stdout()).unwrap_or_log("Batch");

    process::exit(if report.is_success() { 0 } else { 1 });
}
