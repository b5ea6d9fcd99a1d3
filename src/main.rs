use clap::{crate_name, crate_version, App, AppSettings};

use percov::cli;

fn main() {
    let matches = App::new(crate_name!())
        .version(crate_version!())
        .about("Per-base coverage, gaps and summary statistics for one sample over target regions")
        .max_term_width(120)
        .setting(AppSettings::DeriveDisplayOrder)
        .args(cli::args::all())
        .get_matches();

    if let Err(error) = cli::app::run(&matches) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}
