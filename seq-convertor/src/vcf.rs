use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use itertools::Itertools;
use log::{debug, info, warn};

use super::errors::{DuplicateDepthError, VcfLineError};
use super::gmap::{self, GmapLine};

const CONTIG_MARKER: &str = "##contig=<ID=";
const CHR: &str = "chr";
const GZ_EXTENSION: &str = "gz";
const DEPTH_KEY: &str = "DP=";
const COL_QUAL: usize = 5;
const COL_INFO: usize = 7;

pub const SUMMARY_FILE: &str = "comparison_summary.tsv";
pub const CLASSES_FILE: &str = "variant_classes.tsv";
pub const DEPTH_OF_INTEREST_FILE: &str = "depth_of_interest.tsv";

fn is_gzipped(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == GZ_EXTENSION)
}

pub fn open_text(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Plain or gzip text output. `finish` must be called to write the gzip trailer.
pub enum TextWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl TextWriter {
    pub fn finish(self) -> io::Result<()> {
        match self {
            TextWriter::Plain(mut w) => w.flush(),
            TextWriter::Gzip(w) => w.finish()?.flush(),
        }
    }
}

impl Write for TextWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TextWriter::Plain(w) => w.write(buf),
            TextWriter::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TextWriter::Plain(w) => w.flush(),
            TextWriter::Gzip(w) => w.flush(),
        }
    }
}

pub fn create_text(path: &Path) -> io::Result<TextWriter> {
    let file = BufWriter::new(File::create(path)?);
    if is_gzipped(path) {
        Ok(TextWriter::Gzip(GzEncoder::new(file, Compression::default())))
    } else {
        Ok(TextWriter::Plain(file))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SwitchStats {
    pub contigs: usize,
    pub records: usize,
    pub added_chr: Option<bool>,
}

/// Toggles the chr prefix of a contig header line, returning the new line and the direction.
fn switch_contig_header(line: &str) -> (String, bool) {
    let rest = &line[CONTIG_MARKER.len()..];
    match rest.strip_prefix(CHR) {
        Some(stripped) => (format!("{}{}", CONTIG_MARKER, stripped), false),
        None => (format!("{}{}{}", CONTIG_MARKER, CHR, rest), true),
    }
}

pub fn switch_chr_lines<R: BufRead, W: Write>(input: R, mut output: W) -> io::Result<SwitchStats> {
    let mut stats = SwitchStats::default();

    for line in input.lines() {
        let line = line?;
        if line.starts_with('#') {
            if line.starts_with(CONTIG_MARKER) {
                let (switched, add) = switch_contig_header(&line);
                stats.added_chr = Some(add);
                stats.contigs += 1;
                writeln!(output, "{}", switched)?;
            } else {
                writeln!(output, "{}", line)?;
            }
            continue;
        }

        // no contig headers, the first record decides
        let add = *stats.added_chr.get_or_insert_with(|| !line.starts_with(CHR));
        stats.records += 1;
        if add && !line.starts_with(CHR) {
            writeln!(output, "{}{}", CHR, line)?;
        } else if !add && line.starts_with(CHR) {
            writeln!(output, "{}", &line[CHR.len()..])?;
        } else {
            writeln!(output, "{}", line)?;
        }
    }
    output.flush()?;
    Ok(stats)
}

pub fn switch_chr(in_file: &Path, out_file: &Path) -> io::Result<SwitchStats> {
    info!("Switching chromosome names from {} into {}", in_file.display(), out_file.display());
    let mut output = create_text(out_file)?;
    let stats = switch_chr_lines(open_text(in_file)?, &mut output)?;
    output.finish()?;
    match stats.added_chr {
        Some(true) => info!("Added chr to {} contigs and {} records.", stats.contigs, stats.records),
        Some(false) => info!("Removed chr from {} contigs and {} records.", stats.contigs, stats.records),
        None => warn!("No contigs or records were found in {}", in_file.display()),
    }
    Ok(stats)
}

/// `chr:loc` ids of true variants from a minimized GMAP file.
pub fn read_truth_positions<R: Read>(input: R) -> Result<BTreeSet<String>, Box<dyn Error>> {
    Ok(gmap::read_gmap_lines(input)?.into_iter()
        .filter_map(|l| match l {
            GmapLine::Variant(v) => Some(v.chr_loc()),
            _ => None
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct VcfCall {
    pub variant: String,
    pub qual: Option<f64>,
    pub info: String,
}

impl VcfCall {
    pub fn depth(&self) -> Option<u64> {
        self.info.split(';')
            .find(|e| e.starts_with(DEPTH_KEY))
            .and_then(|e| e[DEPTH_KEY.len()..].parse().ok())
    }
}

pub fn read_vcf_calls<R: BufRead>(input: R) -> Result<Vec<VcfCall>, Box<dyn Error>> {
    let mut calls = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') { continue; }

        let fields = gmap::vcf_fields(&line);
        if fields.len() < 2 {
            return Err(VcfLineError { line: i + 1, reason: "expected chromosome and position" }.into());
        }
        calls.push(VcfCall {
            variant: format!("{}:{}", gmap::with_chr_prefix(fields[0]), fields[1]),
            qual: fields.get(COL_QUAL).and_then(|q| q.parse().ok()),
            info: fields.get(COL_INFO).map(|s| s.to_string()).unwrap_or_default(),
        });
    }
    Ok(calls)
}

#[derive(Debug, Default, Clone)]
pub struct TruthComparison {
    pub name: String,
    pub true_positives: BTreeSet<String>,
    pub false_positives: BTreeSet<String>,
    pub false_negatives: BTreeSet<String>,
    pub depth: AHashMap<String, u64>,
}

impl TruthComparison {
    pub fn classify(name: &str, calls: &[VcfCall], truth: &BTreeSet<String>) -> TruthComparison {
        let mut cmp = TruthComparison { name: name.to_string(), ..Default::default() };
        for call in calls {
            if truth.contains(&call.variant) {
                cmp.true_positives.insert(call.variant.clone());
            } else {
                cmp.false_positives.insert(call.variant.clone());
            }
            if let Some(dp) = call.depth() {
                cmp.depth.insert(call.variant.clone(), dp);
            }
        }
        cmp.false_negatives = truth.difference(&cmp.true_positives).cloned().collect();
        cmp
    }

    pub fn classes(&self) -> impl Iterator<Item = (&'static str, &String)> + '_ {
        self.true_positives.iter().map(|v| ("TP", v))
            .chain(self.false_positives.iter().map(|v| ("FP", v)))
            .chain(self.false_negatives.iter().map(|v| ("FN", v)))
    }
}

/// Reads `chr\tloc\tdepth` rows for the locations of interest only.
pub fn read_depth_of_interest<R: Read>(input: R, interest: &AHashSet<String>)
    -> Result<AHashMap<String, u64>, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(input);

    let mut depth = AHashMap::new();
    let mut record = csv::StringRecord::new();
    let mut total: u64 = 0;
    while rdr.read_record(&mut record)? {
        total += 1;
        if total % 1_000_000 == 0 {
            debug!("{} depth lines were read", total);
        }
        if record.len() < 3 { continue; }
        let variant = format!("{}:{}", &record[0], &record[1]);
        if !interest.contains(&variant) { continue; }
        if depth.contains_key(&variant) {
            return Err(DuplicateDepthError(variant).into());
        }
        depth.insert(variant, record[2].trim().parse()?);
    }
    if depth.is_empty() && !interest.is_empty() && total > 0 {
        warn!("None of the {} depth lines matched a location of interest, contigs are compared with their chr prefix.",
              total);
    }
    Ok(depth)
}

fn zero_depth(variants: &BTreeSet<String>, depth: &AHashMap<String, u64>) -> usize {
    variants.iter().filter(|v| depth.get(*v).copied().unwrap_or(0) == 0).count()
}

fn file_label(path: &Path) -> String {
    path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

pub fn compare_to_truth(truth_file: &Path, call_files: &[PathBuf], depth_file: Option<&Path>, out_dir: &Path)
    -> Result<Vec<TruthComparison>, Box<dyn Error>> {
    std::fs::create_dir_all(out_dir)?;

    info!("Reading true variants from {}", truth_file.display());
    let truth = read_truth_positions(File::open(truth_file)?)?;
    info!("True positives: {}", truth.len());

    let mut comparisons = Vec::new();
    for call_file in call_files {
        let calls = read_vcf_calls(BufReader::new(File::open(call_file)?))?;
        let cmp = TruthComparison::classify(&file_label(call_file), &calls, &truth);
        info!("{}: TP {} FP {} FN {}", cmp.name,
              cmp.true_positives.len(), cmp.false_positives.len(), cmp.false_negatives.len());
        comparisons.push(cmp);
    }

    let depth: AHashMap<String, u64> = match depth_file {
        Some(p) => {
            let mut interest = AHashSet::new();
            interest.extend(comparisons.iter()
                .flat_map(|c| c.false_positives.iter().chain(c.false_negatives.iter()))
                .cloned());
            info!("Reading depth for {} locations of interest", interest.len());
            let depth = read_depth_of_interest(File::open(p)?, &interest)?;

            let mut wrtr = BufWriter::new(File::create(out_dir.join(DEPTH_OF_INTEREST_FILE))?);
            for (variant, d) in depth.iter().sorted() {
                let (chrom, loc) = variant.rsplitn(2, ':').collect_tuple::<(&str, &str)>()
                    .map(|(l, c)| (c, l))
                    .unwrap_or((variant.as_str(), ""));
                writeln!(wrtr, "{}\t{}\t{}", chrom, loc, d)?;
            }
            wrtr.flush()?;
            depth
        },
        None => comparisons.iter().flat_map(|c| c.depth.iter())
            .map(|(k, v)| (k.clone(), *v))
            .collect(),
    };

    let mut summary = BufWriter::new(File::create(out_dir.join(SUMMARY_FILE))?);
    writeln!(summary, "File\tTP\tFP\tFN\tTP_zero_depth\tFP_zero_depth\tFN_zero_depth")?;
    for cmp in comparisons.iter() {
        writeln!(summary, "{}\t{}\t{}\t{}\t{}\t{}\t{}", cmp.name,
                 cmp.true_positives.len(), cmp.false_positives.len(), cmp.false_negatives.len(),
                 zero_depth(&cmp.true_positives, &depth),
                 zero_depth(&cmp.false_positives, &depth),
                 zero_depth(&cmp.false_negatives, &depth))?;
    }
    summary.flush()?;

    let mut classes = BufWriter::new(File::create(out_dir.join(CLASSES_FILE))?);
    writeln!(classes, "File\tClass\tVariant\tDepth")?;
    for cmp in comparisons.iter() {
        for (class, variant) in cmp.classes() {
            writeln!(classes, "{}\t{}\t{}\t{}", cmp.name, class, variant,
                     depth.get(variant).copied().unwrap_or(0))?;
        }
    }
    classes.flush()?;

    Ok(comparisons)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricValues {
    pub tp: Vec<f64>,
    pub fp: Vec<f64>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() { 0.0 } else { values.iter().sum::<f64>() / values.len() as f64 }
}

fn median(values: &[f64]) -> f64 {
    let sorted: Vec<f64> = values.iter().copied().sorted_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)).collect();
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 0 => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
        n => sorted[n / 2],
    }
}

/// INFO annotations and QUAL split by whether the call is a true variant.
pub fn collect_metrics(calls: &[VcfCall], truth: &BTreeSet<String>) -> BTreeMap<String, MetricValues> {
    let mut metrics: BTreeMap<String, MetricValues> = BTreeMap::new();

    for call in calls {
        let positive = truth.contains(&call.variant);
        let mut push = |key: &str, value: f64| {
            let entry = metrics.entry(key.to_string()).or_default();
            if positive { entry.tp.push(value) } else { entry.fp.push(value) }
        };

        for annotation in call.info.split(';') {
            if let Some((key, values)) = annotation.splitn(2, '=').collect_tuple::<(&str, &str)>() {
                for value in values.split(',').filter_map(|v| v.parse::<f64>().ok()) {
                    push(key, value);
                }
            }
        }
        if let Some(q) = call.qual {
            push("qual", q);
        }
    }
    metrics
}

pub fn metric_distribution(truth_file: &Path, vcf_file: &Path, out_file: &Path) -> Result<(), Box<dyn Error>> {
    let truth = read_truth_positions(File::open(truth_file)?)?;
    let calls = read_vcf_calls(BufReader::new(File::open(vcf_file)?))?;
    info!("{} calls against {} true variants", calls.len(), truth.len());

    let metrics = collect_metrics(&calls, &truth);
    let mut wrtr = BufWriter::new(File::create(out_file)?);
    writeln!(wrtr, "Metric\tClass\tCount\tMean\tMedian")?;
    for (metric, values) in metrics.iter() {
        for (class, v) in [("TP", &values.tp), ("FP", &values.fp)].iter() {
            writeln!(wrtr, "{}\t{}\t{}\t{}\t{}", metric, class, v.len(), mean(v), median(v))?;
        }
    }
    wrtr.flush()?;
    info!("{} metrics were summarized.", metrics.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contig_headers_drive_the_direction() {
        let vcf = "##fileformat=VCFv4.2\n\
                   ##contig=<ID=chr1,length=100>\n\
                   #CHROM\tPOS\n\
                   chr1\t5\n\
                   1\t6\n";
        let mut out = Vec::new();
        let stats = switch_chr_lines(vcf.as_bytes(), &mut out).unwrap();

        assert_eq!(stats.added_chr, Some(false));
        assert_eq!(String::from_utf8(out).unwrap(),
                   "##fileformat=VCFv4.2\n##contig=<ID=1,length=100>\n#CHROM\tPOS\n1\t5\n1\t6\n");
    }

    #[test]
    fn first_record_decides_without_contigs() {
        let mut out = Vec::new();
        let stats = switch_chr_lines("#CHROM\n2\t5\nchr3\t7\n".as_bytes(), &mut out).unwrap();
        assert_eq!(stats.added_chr, Some(true));
        assert_eq!(stats.records, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "#CHROM\nchr2\t5\nchr3\t7\n");
    }

    #[test]
    fn gzip_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.vcf");
        let output = dir.path().join("out.vcf.gz");
        std::fs::write(&input, "chr1\t5\n").unwrap();

        switch_chr(&input, &output).unwrap();
        let mut text = String::new();
        open_text(&output).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "1\t5\n");
    }

    fn calls() -> Vec<VcfCall> {
        let vcf = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
                   1\t10\t.\tA\tG\t50\tPASS\tDP=12;AF=0.5\n\
                   chr2\t20\t.\tA\tG\t10\tPASS\tDP=0;AF=0.25,0.75\n";
        read_vcf_calls(vcf.as_bytes()).unwrap()
    }

    #[test]
    fn calls_are_split_against_truth() {
        let truth: BTreeSet<String> = vec!["chr1:10".to_string(), "chr3:30".to_string()].into_iter().collect();
        let cmp = TruthComparison::classify("calls.vcf", &calls(), &truth);

        assert!(cmp.true_positives.contains("chr1:10"));
        assert!(cmp.false_positives.contains("chr2:20"));
        assert!(cmp.false_negatives.contains("chr3:30"));
        assert_eq!(cmp.depth.get("chr1:10"), Some(&12));
        assert_eq!(zero_depth(&cmp.false_positives, &cmp.depth), 1);
    }

    #[test]
    fn depth_file_rejects_duplicates() {
        let mut interest = AHashSet::new();
        interest.insert("chr1:5".to_string());
        let ok = read_depth_of_interest("chr1\t5\t3\nchr1\t6\t0\n".as_bytes(), &interest).unwrap();
        assert_eq!(ok.get("chr1:5"), Some(&3));
        assert_eq!(ok.len(), 1);
        assert!(read_depth_of_interest("chr1\t5\t3\nchr1\t5\t4\n".as_bytes(), &interest).is_err());
    }

    #[test]
    fn metrics_are_grouped_by_class() {
        let truth: BTreeSet<String> = vec!["chr1:10".to_string()].into_iter().collect();
        let metrics = collect_metrics(&calls(), &truth);

        assert_eq!(metrics["AF"].tp, vec![0.5]);
        assert_eq!(metrics["AF"].fp, vec![0.25, 0.75]);
        assert_eq!(metrics["qual"].fp, vec![10.0]);
        assert!((median(&metrics["AF"].fp) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bare_contig_depth_table_matches_nothing() {
        let mut interest = AHashSet::new();
        interest.insert("chr1:5".to_string());
        let depth = read_depth_of_interest("1\t5\t3\n".as_bytes(), &interest).unwrap();
        assert!(depth.is_empty());
    }

    #[test]
    fn gzip_writer_is_finished_explicitly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt.gz");
        let mut output = create_text(&path).unwrap();
        writeln!(output, "chr1\t5").unwrap();
        output.finish().unwrap();

        let mut text = String::new();
        flate2::read::GzDecoder::new(File::open(&path).unwrap()).read_to_string(&mut text).unwrap();
        assert_eq!(text, "chr1\t5\n");

        let plain = dir.path().join("out.txt");
        let mut output = create_text(&plain).unwrap();
        writeln!(output, "x").unwrap();
        output.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&plain).unwrap(), "x\n");
    }

    const TRUTH: &str = ">NM_1\t10\t30\n\
                         a/G\t100\tchr1:10\n\
                         c/T\t300\tchr3:30\n";

    fn write_truth_case(dir: &Path) -> (PathBuf, PathBuf) {
        let truth = dir.join("truth.gmap");
        std::fs::write(&truth, TRUTH).unwrap();
        let calls = dir.join("calls.vcf");
        std::fs::write(&calls, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
                                1\t10\t.\tG\tA\t50\tPASS\tDP=12;AF=0.5\n\
                                chr2\t20\t.\tA\tG\t10\tPASS\tDP=0;AF=0.25,0.75\n\
                                chr2\t25\t.\tA\tG\t30\tPASS\tDP=7;AF=0.5\n").unwrap();
        (truth, calls)
    }

    fn read_out(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    #[test]
    fn truth_comparison_uses_vcf_depth_without_depth_table() {
        let dir = tempfile::tempdir().unwrap();
        let (truth, calls) = write_truth_case(dir.path());
        let out_dir = dir.path().join("cmp");

        let cmps = compare_to_truth(&truth, &[calls], None, &out_dir).unwrap();
        assert_eq!(cmps.len(), 1);
        assert!(!out_dir.join(DEPTH_OF_INTEREST_FILE).exists());

        assert_eq!(read_out(&out_dir, SUMMARY_FILE),
                   "File\tTP\tFP\tFN\tTP_zero_depth\tFP_zero_depth\tFN_zero_depth\n\
                    calls.vcf\t1\t2\t1\t0\t1\t1\n");
        assert_eq!(read_out(&out_dir, CLASSES_FILE),
                   "File\tClass\tVariant\tDepth\n\
                    calls.vcf\tTP\tchr1:10\t12\n\
                    calls.vcf\tFP\tchr2:20\t0\n\
                    calls.vcf\tFP\tchr2:25\t7\n\
                    calls.vcf\tFN\tchr3:30\t0\n");
    }

    #[test]
    fn truth_comparison_reads_depth_of_interest() {
        let dir = tempfile::tempdir().unwrap();
        let (truth, calls) = write_truth_case(dir.path());
        let depth = dir.path().join("depth.tsv");
        std::fs::write(&depth, "# chr\tloc\tdepth\n\
                                chr1\t10\t99\n\
                                chr2\t20\t4\n\
                                chr3\t30\t6\n").unwrap();
        let out_dir = dir.path().join("cmp");

        compare_to_truth(&truth, &[calls], Some(depth.as_path()), &out_dir).unwrap();
        assert_eq!(read_out(&out_dir, DEPTH_OF_INTEREST_FILE), "chr2\t20\t4\nchr3\t30\t6\n");
        assert_eq!(read_out(&out_dir, SUMMARY_FILE).lines().nth(1), Some("calls.vcf\t1\t2\t1\t1\t1\t0"));
        assert!(read_out(&out_dir, CLASSES_FILE).contains("calls.vcf\tFN\tchr3:30\t6\n"));
    }

    #[test]
    fn metric_distribution_table() {
        let dir = tempfile::tempdir().unwrap();
        let (truth, calls) = write_truth_case(dir.path());
        let out = dir.path().join("metrics.tsv");

        metric_distribution(&truth, &calls, &out).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Metric\tClass\tCount\tMean\tMedian");
        assert!(lines.contains(&"AF\tTP\t1\t0.5\t0.5"));
        assert!(lines.contains(&"AF\tFP\t3\t0.5\t0.5"));
        assert!(lines.contains(&"DP\tFP\t2\t3.5\t3.5"));
        assert!(lines.contains(&"qual\tFP\t2\t20\t20"));
        assert_eq!(lines.len(), 7);
    }
}
