use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use fern;
use clap::{Arg, App, ArgMatches, SubCommand};
use seq_convertor::{compare_calls_to_truth, compare_gmap_to_vcf, compress_gmap_alignments, convert_fasta_to_fastq,
                    convert_gmap_to_vcf, gmap_read_depth, guess_fastq_format, split_multi_fasta, switch_vcf_chr,
                    vcf_metric_distribution};


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

fn input_arg(hm: &'static str) -> Arg<'static, 'static> {
    Arg::<'static, 'static>::with_name("input")
        .short("i")
        .long("input")
        .value_name("FILE")
        .takes_value(true)
        .required(true)
        .help(hm)
}

fn output_arg(hm: &'static str) -> Arg<'static, 'static> {
    Arg::<'static, 'static>::with_name("output")
        .short("o")
        .long("output")
        .value_name("FILE")
        .takes_value(true)
        .required(true)
        .help(hm)
}

fn truth_arg() -> Arg<'static, 'static> {
    Arg::<'static, 'static>::with_name("truth")
        .short("t")
        .long("truth")
        .value_name("FILE")
        .takes_value(true)
        .required(true)
        .help("Minimized GMAP format 9 file with the true variants.")
}

fn start_logging(matches: &ArgMatches, name: &str) -> Result<(), Box<dyn Error>> {
    let verbosity: u64 = matches.value_of("log_level").unwrap_or("0").parse()?;
    setup_logging(verbosity, format!("{}.log", name).as_ref())?;
    Ok(())
}

/// Path of a required argument.
fn path_of<'a>(matches: &'a ArgMatches, name: &str) -> &'a Path {
    Path::new(matches.value_of(name).unwrap_or_default())
}

fn main() -> Result<(), Box<dyn Error>> {
    let matches = App::new("seq-convertor")
        .version("0.1.0")
        .about("seq-convertor converts between the sequence and variant formats used in the lab. \
                It also guesses fastq quality encodings and compares variant calls to GMAP results.")
        .subcommand(
            SubCommand::with_name("fasta2fastq")
                .about("Convert fasta to fastq with perfect quality scores.")
                .arg( input_arg("Path to file in fasta format.") )
                .arg( output_arg("Path to file in fastq format.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("split-fasta")
                .about("Split a multi fasta file into one file per record.")
                .arg( input_arg("Path to multi fasta file.") )
                .arg(
                    Arg::with_name("out_dir")
                        .short("d")
                        .long("out_dir")
                        .value_name("PATH")
                        .takes_value(true)
                        .required(false)
                        .help("Directory for the split files (current directory by default).")
                )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("fastq-format")
                .about("Guess the quality encoding of a fastq file.")
                .arg( input_arg("Path to file in fastq format.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("gmap-compress")
                .about("Minimize GMAP format 9 alignments to the variants of each entry.")
                .arg( input_arg("Path to GMAP format 9 alignments.") )
                .arg( output_arg("Path to minimized GMAP format 9 file.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("gmap2vcf")
                .about("Convert a minimized GMAP format 9 result to vcf.")
                .arg( input_arg("Path to GMAP result file.") )
                .arg( output_arg("Path to output SNP vcf file.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("gmap-depth")
                .about("Calculate read depth from GMAP format 9 alignments.")
                .arg( input_arg("Path to GMAP format 9 alignments.") )
                .arg( output_arg("Path to read depth table.") )
                .arg(
                    Arg::with_name("targets")
                        .short("m")
                        .long("targets")
                        .value_name("FILE")
                        .takes_value(true)
                        .required(false)
                        .help("Minimized GMAP file, only its variant locations are measured.")
                )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("gmap-compare")
                .about("Compare a minimized GMAP format 9 file to a vcf file.")
                .arg( input_arg("Path to minimized GMAP format 9 file.") )
                .arg(
                    Arg::with_name("vcf")
                        .short("v")
                        .long("vcf")
                        .value_name("FILE")
                        .takes_value(true)
                        .required(true)
                        .help("Path to vcf file to compare with.")
                )
                .arg( output_arg("Path to comparison report.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("switch-chr")
                .about("Add or remove chr in a (gzipped) vcf file.")
                .arg( input_arg("Input vcf file.") )
                .arg( output_arg("Output vcf file.") )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("vcf-truth")
                .about("Split variant calls into true positives, false positives and false negatives.")
                .arg( truth_arg() )
                .arg(
                    Arg::with_name("calls")
                        .short("c")
                        .long("calls")
                        .value_name("FILE")
                        .multiple(true)
                        .takes_value(true)
                        .required(true)
                        .help("Vcf files with variant calls.")
                )
                .arg(
                    Arg::with_name("depth")
                        .short("r")
                        .long("depth")
                        .value_name("FILE")
                        .takes_value(true)
                        .required(false)
                        .help("Depth table (chromosome, location, depth). Vcf DP is used without it.")
                )
                .arg(
                    Arg::with_name("out_dir")
                        .short("d")
                        .long("out_dir")
                        .value_name("PATH")
                        .takes_value(true)
                        .required(true)
                        .help("Directory for comparison tables.")
                )
                .arg( log_level_arg() )
        )
        .subcommand(
            SubCommand::with_name("vcf-metrics")
                .about("Summarize vcf annotations for true and false positive calls.")
                .arg( truth_arg() )
                .arg( input_arg("Vcf file with variant calls.") )
                .arg( output_arg("Path to metric summary table.") )
                .arg( log_level_arg() )
        )
        .get_matches();

    match matches.subcommand() {
        ("fasta2fastq", Some(m)) => {
            start_logging(m, "fasta2fastq")?;
            convert_fasta_to_fastq(path_of(m, "input"), path_of(m, "output"))?;
        },
        ("split-fasta", Some(m)) => {
            start_logging(m, "split-fasta")?;
            let out_dir = m.value_of("out_dir").unwrap_or(".");
            split_multi_fasta(path_of(m, "input"), Path::new(out_dir))?;
        },
        ("fastq-format", Some(m)) => {
            start_logging(m, "fastq-format")?;
            let report = guess_fastq_format(path_of(m, "input"))?;
            println!("{}", report.encoding);
        },
        ("gmap-compress", Some(m)) => {
            start_logging(m, "gmap-compress")?;
            compress_gmap_alignments(path_of(m, "input"), path_of(m, "output"))?;
        },
        ("gmap2vcf", Some(m)) => {
            start_logging(m, "gmap2vcf")?;
            convert_gmap_to_vcf(path_of(m, "input"), path_of(m, "output"))?;
        },
        ("gmap-depth", Some(m)) => {
            start_logging(m, "gmap-depth")?;
            gmap_read_depth(path_of(m, "input"), m.value_of("targets").map(Path::new), path_of(m, "output"))?;
        },
        ("gmap-compare", Some(m)) => {
            start_logging(m, "gmap-compare")?;
            compare_gmap_to_vcf(path_of(m, "input"), path_of(m, "vcf"), path_of(m, "output"))?;
        },
        ("switch-chr", Some(m)) => {
            start_logging(m, "switch-chr")?;
            switch_vcf_chr(path_of(m, "input"), path_of(m, "output"))?;
        },
        ("vcf-truth", Some(m)) => {
            start_logging(m, "vcf-truth")?;
            let calls: Vec<PathBuf> = m.values_of("calls").map(|v| v.map(PathBuf::from).collect()).unwrap_or_default();
            compare_calls_to_truth(path_of(m, "truth"), &calls, m.value_of("depth").map(Path::new),
                                   path_of(m, "out_dir"))?;
        },
        ("vcf-metrics", Some(m)) => {
            start_logging(m, "vcf-metrics")?;
            vcf_metric_distribution(path_of(m, "truth"), path_of(m, "input"), path_of(m, "output"))?;
        },
        ("", None) => eprintln!("No subcommands were provided. See help for available one."),
        _ => unreachable!(),
    };
    Ok(())
}
