use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use fern;
use log::error;
use clap::{Arg, App, ArgMatches, SubCommand};
use bucket_transfer::{check_transfer_log, convert_gs_log, document_transfer, DocumentOptions, MoleculeFilter,
                      Naming, TransferError, TransferType, COMPLETED_WITH_ERROR};


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

fn file_arg(name: &'static str, required: bool, hm: &'static str) -> Arg<'static, 'static> {
    Arg::<'static, 'static>::with_name(name)
        .long(name)
        .value_name("FILE")
        .takes_value(true)
        .required(required)
        .help(hm)
}

fn flag_arg(name: &'static str, hm: &'static str) -> Arg<'static, 'static> {
    Arg::<'static, 'static>::with_name(name)
        .long(name)
        .takes_value(false)
        .help(hm)
}

fn start_logging(matches: &ArgMatches, name: &str) -> Result<(), Box<dyn Error>> {
    let verbosity: u64 = matches.value_of("log_level").unwrap_or("0").parse()?;
    setup_logging(verbosity, format!("{}.log", name).as_ref())?;
    Ok(())
}

fn required_path(matches: &ArgMatches, name: &str) -> PathBuf {
    PathBuf::from(matches.value_of(name).unwrap_or_default())
}

fn document_options(m: &ArgMatches) -> Result<DocumentOptions, Box<dyn Error>> {
    let naming = match (m.value_of("map_ids"), m.value_of("rename")) {
        (Some(map), _) => Naming::Htan(PathBuf::from(map)),
        (None, Some(rename)) => Naming::Anonymized(PathBuf::from(rename)),
        (None, None) => Naming::Keep,
    };

    let mut types = Vec::new();
    if m.is_present("transfer_fastq") { types.push(TransferType::Fastq); }
    if m.is_present("transfer_bam") { types.push(TransferType::Bam); }
    if m.is_present("transfer_matrix") { types.push(TransferType::Matrix); }

    let molecule = MoleculeFilter::from_flags(m.is_present("only_bulk_dna_bams"),
                                              m.is_present("only_bulk_rna_bams"),
                                              m.is_present("only_sc_rna_bams"))?;

    Ok(DocumentOptions {
        tumor: m.value_of("tumor").unwrap_or_default().to_string(),
        bucket: m.value_of("bucket").unwrap_or_default().to_string(),
        ls_file: required_path(m, "ls"),
        hist: m.value_of("hist").map(PathBuf::from),
        hist_temp: required_path(m, "hist_temp"),
        cmd_out: required_path(m, "cmd_out"),
        document_out: required_path(m, "document_out"),
        naming,
        qc_ids: m.value_of("qc_ids").map(PathBuf::from),
        hold_ids: m.value_of("hold_ids").map(PathBuf::from),
        types,
        molecule,
        exclude_keys: m.values_of("exclude_key").map(|v| v.map(String::from).collect()).unwrap_or_default(),
    })
}

fn run() -> Result<i32, Box<dyn Error>> {
    let matches = App::new("bucket-transfer")
        .version("0.1.0")
        .about("bucket-transfer prepares bucket to bucket transfers. It diffs a bucket listing against the \
                historic transfer log, checks sample ids, names destinations and documents the transfer.")
        .subcommand(
            SubCommand::with_name("convert")
                .about("Convert a gsutil log to a historic log.")
                .arg( file_arg("log2hist", true, "Gsutil log to convert to a historic log.") )
                .arg( file_arg("output", true, "Output historic file name.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("Check gsutil logs after transfer.")
                .arg( file_arg("check", true, "Gsutil log to check.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("document")
                .about("Generate documentation and gsutil commands for a transfer.")
                .arg(
                    Arg::with_name("tumor")
                        .long("tumor")
                        .value_name("NAME")
                        .takes_value(true)
                        .required(true)
                        .help("Tumor being documented.")
                )
                .arg(
                    Arg::with_name("bucket")
                        .long("bucket")
                        .value_name("URL")
                        .takes_value(true)
                        .required(true)
                        .help("Bucket to transfer the files to.")
                )
                .arg( file_arg("ls", true, "Time stamped gsutil ls -L listing of the source bucket.") )
                .arg( file_arg("hist", false, "Historic running log, this will be moved, stored, then updated.") )
                .arg( file_arg("hist_temp", true, "The copy of the historic running log before it is manipulated.") )
                .arg( file_arg("cmd_out", true, "Gsutil commands output file.") )
                .arg( file_arg("document_out", true, "Document file name.") )
                .arg( file_arg("map_ids", false, "Mapping file from HTAPP/SMP ids to HTAN ids.") )
                .arg( file_arg("rename", false, "Rename registry used to anonymize ids, updated after the run.") )
                .arg( file_arg("qc_ids", false, "Id file for QC.") )
                .arg( file_arg("hold_ids", false, "Id file with ids on hold.") )
                .arg(
                    Arg::with_name("exclude_key")
                        .long("exclude_key")
                        .value_name("KEY")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1)
                        .help("Files with this text in their path are not transferred.")
                )
                .arg( flag_arg("transfer_fastq", "Allow fastqs to be transferred.") )
                .arg( flag_arg("transfer_bam", "Allow bams to be transferred.") )
                .arg( flag_arg("transfer_matrix", "Allow matrices to be transferred.") )
                .arg( flag_arg("only_bulk_dna_bams", "Restrict bams to only known bulk DNA bams.") )
                .arg( flag_arg("only_bulk_rna_bams", "Restrict bams to only known bulk RNA bams.") )
                .arg( flag_arg("only_sc_rna_bams", "Restrict bams to only known single cell RNA bams.") )
                .arg( log_level_arg() )
        )
        .get_matches();

    match matches.subcommand() {
        ("convert", Some(m)) => {
            start_logging(m, "convert")?;
            convert_gs_log(&required_path(m, "log2hist"), &required_path(m, "output"))?;
        },
        ("check", Some(m)) => {
            start_logging(m, "check")?;
            check_transfer_log(&required_path(m, "check"))?;
        },
        ("document", Some(m)) => {
            start_logging(m, "document")?;
            let opts = document_options(m)?;
            if !document_transfer(&opts)? {
                return Ok(COMPLETED_WITH_ERROR);
            }
        },
        ("", None) => eprintln!("No subcommands were provided. See help for available one."),
        _ => unreachable!(),
    };
    Ok(0)
}

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("Stopped with error: {}", e);
            let code = e.downcast_ref::<TransferError>().map_or(1, |te| te.exit_code());
            process::exit(code);
        }
    }
}
