use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use fern;
use log::error;
use clap::{Arg, App, ArgMatches, SubCommand};
use sample_utils::{check_md5sums, convert_for_inspector, make_bsub_scripts, pair_samples_to_file, rename_samples,
                   BsubOptions, RenameMode, RenameOptions, UtilsError};


fn setup_logging(verbosity: u64, log_file: &Path) -> Result<(), fern::InitError> {
    let mut base_config = fern::Dispatch::new();

    base_config = match verbosity {
        0 => base_config.level(log::LevelFilter::Info),
        1 => base_config.level(log::LevelFilter::Debug),
        _ => base_config.level(log::LevelFilter::Trace),
    };

    let file_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(log_file)?);

    let stdout_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%H:%M"),
                record.target(),
                record.level(),
                message
            ))
        })
        .chain(io::stdout());

    base_config
        .chain(file_config)
        .chain(stdout_config)
        .apply()?;

    Ok(())
}

fn log_level_arg() -> Arg<'static, 'static> {
    Arg::<'static, 'static>::with_name("log_level")
        .short("l")
        .long("log_level")
        .value_name("NUM")
        .takes_value(true)
        .required(false)
        .help("Verbosity of logging (0 - 3)")
}

fn value_arg(name: &'static str, short: &'static str, required: bool, hm: &'static str) -> Arg<'static, 'static> {
    Arg::<'static, 'static>::with_name(name)
        .short(short)
        .long(name)
        .value_name("VALUE")
        .takes_value(true)
        .required(required)
        .help(hm)
}

fn start_logging(matches: &ArgMatches, name: &str) -> Result<(), Box<dyn Error>> {
    let verbosity: u64 = matches.value_of("log_level").unwrap_or("0").parse()?;
    setup_logging(verbosity, format!("{}.log", name).as_ref())?;
    Ok(())
}

/// Value of a required argument or one with a default.
fn value_of<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.value_of(name).unwrap_or_default()
}

fn run() -> Result<(), Box<dyn Error>> {
    let matches = App::new("sample-utils")
        .version("0.1.0")
        .about("sample-utils collects small helpers for sample files: pairing, renaming, bsub scripts, \
                md5sum checks and inspector input.")
        .subcommand(
            SubCommand::with_name("pair")
                .about("Pair samples in a directory and make a samples file.")
                .arg( value_arg("dir", "d", true, "Directory containing samples.") )
                .arg( value_arg("file_type", "t", true, "Suffix of files to look for.") )
                .arg( value_arg("prefix", "p", true, "Sentinel for the end of the prefix which is the key of paired samples. \
                                                      Eg. _ for test_left.txt and test_right.txt") )
                .arg( value_arg("out", "o", true, "Sample file.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("rename")
                .about("Rename files given a mapping file, or make renamed links in a directory.")
                .arg( value_arg("extension", "x", true, "Extension of the files to update.") )
                .arg( value_arg("map_file", "m", true, "Mapping file (new_token\\told_token).") )
                .arg( value_arg("input_dir", "i", true, "The dir to look for files to update.") )
                .arg( value_arg("link_dir", "k", false, "If given, files are not renamed but links are made in this dir.") )
                .arg(
                    value_arg("mode", "d", false, "Mode to run in: flat or mut_bam.")
                        .default_value("flat")
                )
                .arg(
                    Arg::with_name("apply")
                        .long("apply")
                        .takes_value(false)
                        .help("Rename the files in place. Without it and without a link dir the plan is only logged.")
                )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("bsub")
                .about("Make many bsub commands from a sample file.")
                .arg( value_arg("command", "c", true, "The command to bsub with ### which will be replaced by sample names.") )
                .arg( value_arg("samples", "s", true, "The file containing samples, one sample name per line.") )
                .arg(
                    Arg::with_name("email")
                        .short("e")
                        .long("email")
                        .takes_value(false)
                        .help("Send an email for each command with the status of the run.")
                )
                .arg( value_arg("group", "g", false, "The number of bsub commands per file made.").default_value("10") )
                .arg( value_arg("memory", "m", false, "The amount of memory in GB needed.").default_value("8") )
                .arg( value_arg("out", "o", false, "The base name of the sh files that will be created.").default_value("output_bsub") )
                .arg( value_arg("queue", "q", false, "The queue to bsub in.").default_value("regevlab") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("md5check")
                .about("Check md5sums against a truth file.")
                .arg( value_arg("check", "c", true, "File of md5sums to check, in md5sum format.") )
                .arg( value_arg("truth", "t", true, "File of md5sums which are true to check against.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("inspector")
                .about("Convert the validation pipeline JSON to a file usable by the inspector.")
                .arg( value_arg("output_dir", "o", true, "Output dir, must not exist.") )
                .arg( value_arg("input_json", "i", true, "Input JSON file.") )
                .arg( log_level_arg() )
        )
        .get_matches();

    match matches.subcommand() {
        ("pair", Some(m)) => {
            start_logging(m, "pair")?;
            pair_samples_to_file(Path::new(value_of(m, "dir")), value_of(m, "file_type"), value_of(m, "prefix"),
                                 Path::new(value_of(m, "out")))?;
        },
        ("rename", Some(m)) => {
            start_logging(m, "rename")?;
            let opts = RenameOptions {
                extension: value_of(m, "extension").to_string(),
                map_file: PathBuf::from(value_of(m, "map_file")),
                input_dir: PathBuf::from(value_of(m, "input_dir")),
                link_dir: m.value_of("link_dir").map(PathBuf::from),
                mode: value_of(m, "mode").parse::<RenameMode>()?,
                apply: m.is_present("apply"),
            };
            rename_samples(&opts)?;
        },
        ("bsub", Some(m)) => {
            start_logging(m, "bsub")?;
            let opts = BsubOptions {
                command_template: value_of(m, "command").to_string(),
                email: m.is_present("email"),
                group: value_of(m, "group").parse()?,
                memory: value_of(m, "memory").to_string(),
                out: value_of(m, "out").to_string(),
                queue: value_of(m, "queue").to_string(),
            };
            make_bsub_scripts(Path::new(value_of(m, "samples")), &opts)?;
        },
        ("md5check", Some(m)) => {
            start_logging(m, "md5check")?;
            check_md5sums(Path::new(value_of(m, "check")), Path::new(value_of(m, "truth")))?;
        },
        ("inspector", Some(m)) => {
            start_logging(m, "inspector")?;
            convert_for_inspector(Path::new(value_of(m, "output_dir")), Path::new(value_of(m, "input_json")))?;
        },
        ("", None) => eprintln!("No subcommands were provided. See help for available one."),
        _ => unreachable!(),
    };
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("Stopped with error: {}", e);
        let code = e.downcast_ref::<UtilsError>().map_or(1, |ue| ue.exit_code());
        process::exit(code);
    }
}
