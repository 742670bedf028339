use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use lectern::build::build_site;
use lectern::config::{Config, Overrides};
use log::LevelFilter;
use std::path::PathBuf;
use std::process;

/// Exit status for a build that finished but left documents out.
const EXIT_SKIPPED: i32 = 2;

fn main() {
    let matches = App::new("lectern")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds a static site from Markdown articles")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Logs more detail; repeat for debug output"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site into the output directory")
                .arg(path_arg(
                    "project",
                    "FILE",
                    "The project file (default: nearest lectern.yaml)",
                ))
                .arg(path_arg(
                    "content",
                    "DIR",
                    "The directory holding the Markdown sources",
                ))
                .arg(path_arg(
                    "theme",
                    "DIR",
                    "The directory holding the theme",
                ))
                .arg(path_arg(
                    "output",
                    "DIR",
                    "The directory to build into",
                ))
                .arg(
                    Arg::with_name("drafts")
                        .long("drafts")
                        .help(
                            "Renders pages for drafts; they are still left \
                             out of listings",
                        ),
                )
                .arg(
                    Arg::with_name("skip-broken")
                        .long("skip-broken")
                        .help(
                            "Skips documents that fail to parse or render \
                             instead of aborting",
                        ),
                )
                .arg(
                    Arg::with_name("threads")
                        .long("threads")
                        .takes_value(true)
                        .value_name("N")
                        .help("The number of worker threads"),
                ),
        )
        .get_matches();

    init_logging(matches.occurrences_of("verbose"));

    if let ("build", Some(build)) = matches.subcommand() {
        process::exit(run_build(build));
    }
}

fn path_arg<'a, 'b>(
    name: &'a str,
    value_name: &'b str,
    help: &'b str,
) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .value_name(value_name)
        .help(help)
}

// RUST_LOG, when set, overrides the level chosen by `-v`.
fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run_build(matches: &ArgMatches) -> i32 {
    let threads = match matches.value_of("threads").map(str::parse::<usize>) {
        None => None,
        Some(Ok(n)) if n > 0 => Some(n),
        Some(_) => {
            log::error!("`--threads` must be a positive integer");
            return 1;
        }
    };
    let overrides = Overrides {
        project_file: matches.value_of("project").map(PathBuf::from),
        content_directory: matches.value_of("content").map(PathBuf::from),
        theme_directory: matches.value_of("theme").map(PathBuf::from),
        output_directory: matches.value_of("output").map(PathBuf::from),
        drafts: matches.is_present("drafts"),
        skip_broken: matches.is_present("skip-broken"),
        threads,
    };

    let working_directory = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            log::error!("reading working directory: {}", err);
            return 1;
        }
    };
    let config = match Config::load(&working_directory, overrides) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{}", err);
            return 1;
        }
    };

    match build_site(&config) {
        Ok(report) => {
            log::info!(
                "wrote {} pages for {} documents ({} drafts) to `{}`",
                report.pages,
                report.documents,
                report.drafts,
                config.output_directory.display()
            );
            if report.skipped.is_empty() {
                0
            } else {
                log::warn!("skipped {} broken documents", report.skipped.len());
                EXIT_SKIPPED
            }
        }
        Err(err) => {
            log::error!("{}", err);
            1
        }
    }
}
