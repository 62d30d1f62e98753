use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ahash::AHashSet;
use itertools::Itertools;
use log::{debug, info, warn};

use super::errors::{DuplicateHeaderError, GmapLineError};

// GMAP format 9 columns
const COL_VARIANT: usize = 0;
const COL_GLOBAL_POS: usize = 1;
const COL_LOCATION: usize = 2;

const FIELD_SEP: u8 = b'\t';
const TRANSCRIPT_HEADER: char = '>';
const COMMENT: char = '#';
const CHR_PREFIX: &str = "chr";

pub const MISSING_IN_MAPPING: &str = "missing_in_mapping";
pub const MISSING_IN_VCF: &str = "missing_in_vcf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-")
        }
    }
}

/// Splits an optional strand sign off a GMAP location.
pub fn split_strand(location: &str) -> (Strand, &str) {
    match location.as_bytes().first() {
        Some(b'+') => (Strand::Forward, &location[1..]),
        Some(b'-') => (Strand::Reverse, &location[1..]),
        _ => (Strand::Forward, location),
    }
}

pub fn complement(bases: &str) -> String {
    bases.chars().map(|c| match c {
        'A' => 'T', 'C' => 'G', 'G' => 'C', 'T' => 'A',
        'a' => 't', 'c' => 'g', 'g' => 'c', 't' => 'a',
        other => other,
    }).collect()
}

pub fn has_chr_prefix(chrom: &str) -> bool {
    chrom.get(..CHR_PREFIX.len()).map_or(false, |p| p.eq_ignore_ascii_case(CHR_PREFIX))
}

pub fn with_chr_prefix(chrom: &str) -> String {
    if has_chr_prefix(chrom) { chrom.to_string() } else { format!("{}{}", CHR_PREFIX, chrom) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GmapVariant {
    pub alt: String,
    pub reference: String,
    pub global_pos: String,
    pub strand: Strand,
    pub chrom: String,
    pub pos: String,
}

impl GmapVariant {
    fn from_record(rec: &csv::StringRecord, line: usize) -> Result<GmapVariant, GmapLineError> {
        if rec.len() <= COL_LOCATION {
            return Err(GmapLineError { line, reason: "expected at least 3 columns" });
        }
        let (alt, reference) = rec[COL_VARIANT].split('/').collect_tuple::<(&str, &str)>()
            .ok_or(GmapLineError { line, reason: "variant must look like alt/ref" })?;
        let (strand, location) = split_strand(&rec[COL_LOCATION]);
        let (chrom, pos) = location.rsplitn(2, ':').collect_tuple::<(&str, &str)>()
            .map(|(p, c)| (c, p))
            .ok_or(GmapLineError { line, reason: "location must look like chr:pos" })?;

        Ok(GmapVariant {
            alt: alt.to_string(),
            reference: reference.to_string(),
            global_pos: rec[COL_GLOBAL_POS].to_string(),
            strand,
            chrom: chrom.to_string(),
            pos: pos.to_string(),
        })
    }

    /// Reference and alternative bases on the forward strand.
    pub fn forward_alleles(&self) -> (String, String) {
        match self.strand {
            Strand::Forward => (self.reference.clone(), self.alt.clone()),
            Strand::Reverse => (complement(&self.reference), complement(&self.alt)),
        }
    }

    pub fn chr_loc(&self) -> String {
        format!("{}:{}", self.chrom, self.pos)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GmapLine {
    Transcript(String),
    Comment,
    Variant(GmapVariant),
}

fn tsv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(FIELD_SEP)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(input)
}

/// Reads a minimized GMAP format 9 file line by line.
pub fn read_gmap_lines<R: Read>(input: R) -> Result<Vec<GmapLine>, Box<dyn Error>> {
    let mut rdr = tsv_reader(input);
    let mut lines = Vec::new();
    let mut record = csv::StringRecord::new();

    while rdr.read_record(&mut record)? {
        let line = record.position().map_or(0, |p| p.line() as usize);
        let first = &record[0];
        if first.is_empty() { continue; }
        if first.starts_with(TRANSCRIPT_HEADER) {
            lines.push(GmapLine::Transcript(first[1..].to_string()));
        } else if first.starts_with(COMMENT) {
            lines.push(GmapLine::Comment);
        } else {
            lines.push(GmapLine::Variant(GmapVariant::from_record(&record, line)?));
        }
    }
    Ok(lines)
}

pub fn vcf_header(sample: &str, date: &str) -> Vec<String> {
    vec![
        "##fileformat=VCFv4.2".to_string(),
        format!("##fileDate={}", date),
        "##Synthetically derived".to_string(),
        "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">".to_string(),
        ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO", "FORMAT", sample].join("\t"),
    ]
}

pub fn write_vcf_from_gmap<R: Read, W: Write>(input: R, output: W, sample: &str, date: &str)
    -> Result<usize, Box<dyn Error>> {
    let mut transcript: Option<String> = None;
    let mut body = Vec::new();

    for line in read_gmap_lines(input)? {
        match line {
            GmapLine::Transcript(name) => transcript = Some(name),
            GmapLine::Comment => {},
            GmapLine::Variant(v) => {
                let (reference, alt) = v.forward_alleles();
                body.push([
                    with_chr_prefix(&v.chrom).as_str(),
                    v.pos.as_str(),
                    transcript.as_deref().unwrap_or("."),
                    reference.to_uppercase().as_str(),
                    alt.to_uppercase().as_str(),
                    ".", "PASS", ".", "GT", "0/1",
                ].join("\t"));
            }
        }
    }
    body.sort();

    let mut wrtr = BufWriter::new(output);
    for line in vcf_header(sample, date).iter().chain(body.iter()) {
        writeln!(wrtr, "{}", line)?;
    }
    wrtr.flush()?;
    Ok(body.len())
}

pub fn gmap_to_vcf(gmap_file: &Path, vcf_file: &Path) -> Result<usize, Box<dyn Error>> {
    let sample = gmap_file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();

    info!("Converting GMAP result {} to {}", gmap_file.display(), vcf_file.display());
    let n = write_vcf_from_gmap(File::open(gmap_file)?, File::create(vcf_file)?, &sample, &date)?;
    info!("{} variants were written.", n);
    Ok(n)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompressSummary {
    pub entries: usize,
    pub alignments: usize,
    pub misalignments: usize,
    pub false_alignments: usize,
    pub duplicate_headers: usize,
}

fn is_lowercase(bases: &str) -> bool {
    bases.chars().any(char::is_lowercase) && !bases.chars().any(char::is_uppercase)
}

/// Writes an entry whose header lists its expected variant locations. Entries without locations are dropped.
fn write_entry<W: Write>(output: &mut W, header: &[String], variants: &[String], summary: &mut CompressSummary)
    -> io::Result<()> {
    if header.len() < 2 {
        return Ok(());
    }
    let expected = header.len() - 1;
    let found = variants.len();
    if found != expected {
        warn!("{} should have had {} entries but found {} entries instead.", header.join("\t"), expected, found);
    }

    writeln!(output, "{}", header.join("\t"))?;
    for variant in variants {
        writeln!(output, "{}", variant)?;
    }
    summary.entries += 1;
    summary.alignments += found.min(expected);
    summary.misalignments += expected.saturating_sub(found);
    summary.false_alignments += found.saturating_sub(expected);
    Ok(())
}

/// Minimizes full GMAP format 9 alignments to the variant bases of each entry.
///
/// Variants are lower case read bases differing from the reference, written as
/// `variant/ref \t global_pos \t contig_loc` under their entry header.
pub fn compress_alignments<R: Read, W: Write>(alignments: R, output: W) -> Result<CompressSummary, Box<dyn Error>> {
    let mut rdr = tsv_reader(alignments);
    let mut record = csv::StringRecord::new();
    let mut wrtr = BufWriter::new(output);
    let mut summary = CompressSummary::default();
    let mut transcripts: AHashSet<String> = AHashSet::new();
    let mut header: Vec<String> = Vec::new();
    let mut variants: Vec<String> = Vec::new();

    writeln!(wrtr, "# >Entry")?;
    writeln!(wrtr, "# Variant\tGlobal_loc\tContig_loc\tOriginal_read_loc")?;
    writeln!(wrtr)?;

    while rdr.read_record(&mut record)? {
        let first = &record[0];
        if first.is_empty() { continue; }

        if first.starts_with(TRANSCRIPT_HEADER) || first.starts_with(COMMENT) {
            // gmap repeats the header while continuing the same alignment
            if header.join(" ") == first { continue; }

            let transcript = first.split(' ').next().unwrap_or(first);
            if !transcripts.insert(transcript.to_string()) {
                summary.duplicate_headers += 1;
                warn!("Duplicate header: {}", first);
            }
            write_entry(&mut wrtr, &header, &variants, &mut summary)?;
            header = first.split(' ').map(|s| s.to_string()).collect();
            variants.clear();
            continue;
        }

        if header.is_empty() {
            warn!("Found variant data without a header: {}", record.iter().join("\t"));
            continue;
        }

        let line = record.position().map_or(0, |p| p.line() as usize);
        let variant = record.get(1).and_then(|c| c.split(' ').last()).unwrap_or("");
        let (contig, global, reference) = record.get(COL_LOCATION)
            .and_then(|c| c.split(' ').next_tuple::<(&str, &str, &str)>())
            .ok_or(GmapLineError { line, reason: "expected contig location, global position and reference base" })?;
        if !variant.is_empty() && !reference.is_empty() && variant != reference && is_lowercase(variant) {
            variants.push(format!("{}/{}\t{}\t{}", variant, reference, global, contig));
        }
    }
    write_entry(&mut wrtr, &header, &variants, &mut summary)?;
    wrtr.flush()?;
    Ok(summary)
}

pub fn gmap_compress(alignment_file: &Path, out_file: &Path) -> Result<CompressSummary, Box<dyn Error>> {
    info!("Minimizing GMAP alignments {} into {}", alignment_file.display(), out_file.display());
    let summary = compress_alignments(File::open(alignment_file)?, File::create(out_file)?)?;

    info!("Entries written: {}", summary.entries);
    info!("Alignments found: {}", summary.alignments);
    info!("Alignments not found: {}", summary.misalignments);
    info!("False alignments: {}", summary.false_alignments);
    info!("Duplicate header (includes non-variant containing headers): {}", summary.duplicate_headers);
    Ok(summary)
}

/// Global positions listed in a minimized GMAP file.
pub fn read_target_positions<R: Read>(input: R) -> Result<AHashSet<String>, Box<dyn Error>> {
    Ok(read_gmap_lines(input)?.into_iter()
        .filter_map(|l| match l {
            GmapLine::Variant(v) => Some(v.global_pos),
            _ => None
        })
        .collect())
}

pub fn count_read_depth<R: Read>(alignments: R, targets: Option<&AHashSet<String>>)
    -> Result<BTreeMap<(String, String), usize>, Box<dyn Error>> {
    let mut rdr = tsv_reader(alignments);
    let mut record = csv::StringRecord::new();
    let mut depth = BTreeMap::new();
    let mut headers: AHashSet<String> = AHashSet::new();
    let mut prev_header = String::new();

    while rdr.read_record(&mut record)? {
        let first = &record[0];
        if first.is_empty() { continue; }

        if first.starts_with(TRANSCRIPT_HEADER) || first.starts_with(COMMENT) {
            if first == prev_header { continue; }
            if !headers.insert(first.to_string()) {
                return Err(DuplicateHeaderError(first.to_string()).into());
            }
            prev_header = first.to_string();
            continue;
        }

        let line = record.position().map_or(0, |p| p.line() as usize);
        let (contig, global) = record.get(COL_LOCATION)
            .and_then(|loc| loc.split_whitespace().next_tuple::<(&str, &str)>())
            .ok_or(GmapLineError { line, reason: "expected contig location and global position" })?;
        if let Some(t) = targets {
            if !t.contains(global) { continue; }
        }
        let (_, contig) = split_strand(contig);
        *depth.entry((global.to_string(), contig.to_string())).or_insert(0) += 1;
    }
    Ok(depth)
}

pub fn gmap_read_depth(alignment_file: &Path, target_file: Option<&Path>, out_file: &Path)
    -> Result<usize, Box<dyn Error>> {
    let targets = match target_file {
        Some(p) => {
            info!("Restricting read depth to variants in {}", p.display());
            Some(read_target_positions(File::open(p)?)?)
        },
        None => None,
    };

    info!("Counting read depth in {}", alignment_file.display());
    let depth = count_read_depth(File::open(alignment_file)?, targets.as_ref())?;

    let mut wrtr = BufWriter::new(File::create(out_file)?);
    writeln!(wrtr, "# Global_loc\tContig_loc\tRead_depth")?;
    writeln!(wrtr)?;
    for ((global, contig), n) in depth.iter() {
        writeln!(wrtr, "{}\t{}\t{}", global, contig, n)?;
    }
    wrtr.flush()?;
    info!("Read depth written for {} locations.", depth.len());
    Ok(depth.len())
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompareCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub gmap_variants: usize,
    pub vcf_variants: usize,
}

impl CompareCounts {
    pub fn false_positive_rate(&self) -> f64 {
        let called = self.true_positives + self.false_positives;
        if called == 0 { 0.0 } else { self.false_positives as f64 / called as f64 }
    }
}

/// Splits a VCF body line into fields; whitespace separated lines are accepted.
pub fn vcf_fields(line: &str) -> Vec<&str> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() == 1 { line.split_whitespace().collect() } else { fields }
}

pub fn compare_gmap_with_vcf<G: Read, V: BufRead, W: Write>(gmap: G, vcf: V, output: W)
    -> Result<CompareCounts, Box<dyn Error>> {
    let mut counts = CompareCounts::default();

    // pos -> chromosomes
    let mut mapping: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for line in read_gmap_lines(gmap)? {
        if let GmapLine::Variant(v) = line {
            mapping.entry(v.pos).or_default().insert(v.chrom);
            counts.gmap_variants += 1;
        }
    }
    debug!("{} GMAP variants at {} positions", counts.gmap_variants, mapping.len());

    let mut wrtr = BufWriter::new(output);
    for line in vcf.lines() {
        let line = line?;
        let fields = vcf_fields(&line);
        if fields.len() < 2 || fields[0].starts_with(COMMENT) { continue; }
        let (chrom, pos) = (fields[0], fields[1]);
        counts.vcf_variants += 1;

        if mapping.get_mut(pos).map_or(false, |chroms| chroms.remove(chrom)) {
            counts.true_positives += 1;
        } else {
            counts.false_positives += 1;
            writeln!(wrtr, "{}\t{}\t{}", chrom, pos, MISSING_IN_MAPPING)?;
        }
    }

    for (pos, chroms) in mapping.iter() {
        for chrom in chroms.iter() {
            counts.false_negatives += 1;
            writeln!(wrtr, "{}\t{}\t{}", chrom, pos, MISSING_IN_VCF)?;
        }
    }

    writeln!(wrtr, "True_Positives\t{}", counts.true_positives)?;
    writeln!(wrtr, "False_Positives ( Only in vcf )\t{}", counts.false_positives)?;
    writeln!(wrtr, "False_Positive_Rate\t{}", counts.false_positive_rate())?;
    writeln!(wrtr, "False_Negatives ( Only in GMAP )\t{}", counts.false_negatives)?;
    writeln!(wrtr, "GMAP variants Count\t{}", counts.gmap_variants)?;
    wrtr.flush()?;
    Ok(counts)
}

pub fn gmap_compare(gmap_file: &Path, vcf_file: &Path, out_file: &Path) -> Result<CompareCounts, Box<dyn Error>> {
    info!("Comparing {} with {}", gmap_file.display(), vcf_file.display());
    let counts = compare_gmap_with_vcf(File::open(gmap_file)?,
                                       BufReader::new(File::open(vcf_file)?),
                                       File::create(out_file)?)?;
    if counts.vcf_variants == 0 {
        warn!("No variants were read from {}", vcf_file.display());
    }
    info!("TP: {} FP: {} FN: {}", counts.true_positives, counts.false_positives, counts.false_negatives);
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GMAP: &str = ">NM_001012993-hB\t1278\t297\t135\n\
                        g/C\t1652129990\tchr9:112970278\n\
                        # comment\n\
                        \n\
                        >NM_2\t1\t2\n\
                        a/G\t100\t-5:200\n";

    #[test]
    fn parses_variants_and_headers() {
        let lines = read_gmap_lines(GMAP.as_bytes()).unwrap();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], GmapLine::Transcript("NM_001012993-hB".to_string()));
        match &lines[4] {
            GmapLine::Variant(v) => {
                assert_eq!(v.strand, Strand::Reverse);
                assert_eq!(v.chrom, "5");
                assert_eq!(v.pos, "200");
                assert_eq!(v.forward_alleles(), ("C".to_string(), "t".to_string()));
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_variant_is_an_error() {
        assert!(read_gmap_lines("gC\t1\tchr1:5\n".as_bytes()).is_err());
        assert!(read_gmap_lines("g/C\t1\n".as_bytes()).is_err());
    }

    #[test]
    fn vcf_lines_are_sorted_and_prefixed() {
        let mut out = Vec::new();
        let n = write_vcf_from_gmap(GMAP.as_bytes(), &mut out, "sample", "2020-01-01").unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(n, 2);
        assert_eq!(lines[1], "##fileDate=2020-01-01");
        assert!(lines[4].ends_with("FORMAT\tsample"));
        assert_eq!(lines[5], "chr5\t200\tNM_2\tC\tT\t.\tPASS\t.\tGT\t0/1");
        assert_eq!(lines[6], "chr9\t112970278\tNM_001012993-hB\tC\tG\t.\tPASS\t.\tGT\t0/1");
    }

    #[test]
    fn chr_prefix_is_case_insensitive() {
        assert_eq!(with_chr_prefix("Chr1"), "Chr1");
        assert_eq!(with_chr_prefix("X"), "chrX");
        assert_eq!(with_chr_prefix("ch"), "chrch");
    }

    #[test]
    fn read_depth_counts_targets_only() {
        let aln = ">read1\t1\t2\n\
                   a/G\t0\t+chr1:10 100\n\
                   >read1\t1\t2\n\
                   a/G\t0\t-chr1:10 100\n\
                   >read2\t1\t2\n\
                   a/G\t0\tchr1:20 200\n";
        let all = count_read_depth(aln.as_bytes(), None).unwrap();
        assert_eq!(all.get(&("100".to_string(), "chr1:10".to_string())), Some(&2));
        assert_eq!(all.len(), 2);

        let mut targets = AHashSet::new();
        targets.insert("200".to_string());
        let some = count_read_depth(aln.as_bytes(), Some(&targets)).unwrap();
        assert_eq!(some.len(), 1);
    }

    #[test]
    fn repeated_header_is_rejected() {
        let aln = ">read1\t1\n>read2\t1\n>read1\t1\n";
        assert!(count_read_depth(aln.as_bytes(), None).is_err());
    }

    #[test]
    fn compare_reports_missing_both_ways() {
        let gmap = "g/C\t1\tchr1:10\ng/C\t2\tchr2:10\na/T\t3\tchr1:30\n";
        let vcf = "##header\n#CHROM\tPOS\nchr1\t10\t.\tA\tG\nchr1 40 . A G\n";
        let mut out = Vec::new();
        let counts = compare_gmap_with_vcf(gmap.as_bytes(), vcf.as_bytes(), &mut out).unwrap();

        assert_eq!(counts.true_positives, 1);
        assert_eq!(counts.false_positives, 1);
        assert_eq!(counts.false_negatives, 2);
        assert_eq!(counts.vcf_variants, 2);
        assert!((counts.false_positive_rate() - 0.5).abs() < 1e-9);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("chr1\t40\tmissing_in_mapping\n"));
        assert!(text.contains("chr2\t10\tmissing_in_vcf\n"));
        assert!(text.contains("chr1\t30\tmissing_in_vcf\n"));
    }

    const ALIGNMENTS: &str = "0\tA 1 a\t+chr1:1 1 G\n\
                              >NM_1 1000 1010\t2\n\
                              0\tA 1 a\t+chr1:500 1000 G\n\
                              >NM_1 1000 1010\t2\n\
                              1\tC 2 c\t+chr1:510 1010 T\n\
                              2\tC 3 C\t+chr1:511 1011 C\n\
                              \n\
                              >NM_2 2000\t1\n\
                              0\tG 1 G\t-chr2:50 2000 G\n\
                              >NM_1 1000 1010\t2\n\
                              0\tA 1 a\t+chr1:500 1000 G\n\
                              1\tC 2 c\t+chr1:510 1010 T\n\
                              2\tT 3 t\t+chr1:520 1020 A\n\
                              >NM_4\t1\n\
                              0\tA 1 a\t+chr4:5 4000 G\n";

    #[test]
    fn compress_keeps_lower_case_variants_per_entry() {
        let mut out = Vec::new();
        let summary = compress_alignments(ALIGNMENTS.as_bytes(), &mut out).unwrap();

        assert_eq!(summary, CompressSummary {
            entries: 3,
            alignments: 4,
            misalignments: 1,
            false_alignments: 1,
            duplicate_headers: 1,
        });

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# >Entry\n# Variant\tGlobal_loc\tContig_loc\tOriginal_read_loc\n\n>NM_1\t1000\t1010\n"));
        assert!(text.contains("a/G\t1000\t+chr1:500\nc/T\t1010\t+chr1:510\n>NM_2\t2000\n>NM_1\t1000\t1010\n"));
        assert!(!text.contains("NM_4"));
        assert!(!text.contains("chr1:1\n"));
    }

    #[test]
    fn compressed_output_reads_back_as_minimized_gmap() {
        let mut out = Vec::new();
        compress_alignments(ALIGNMENTS.as_bytes(), &mut out).unwrap();

        let lines = read_gmap_lines(out.as_slice()).unwrap();
        let transcripts: Vec<&str> = lines.iter()
            .filter_map(|l| match l { GmapLine::Transcript(t) => Some(t.as_str()), _ => None })
            .collect();
        let variants: Vec<&GmapVariant> = lines.iter()
            .filter_map(|l| match l { GmapLine::Variant(v) => Some(v), _ => None })
            .collect();

        assert_eq!(transcripts, vec!["NM_1", "NM_2", "NM_1"]);
        assert_eq!(variants.len(), 5);
        assert_eq!(variants[0].chr_loc(), "chr1:500");
        assert_eq!(variants[0].global_pos, "1000");
        assert_eq!(variants[4].forward_alleles(), ("A".to_string(), "t".to_string()));

        let mut vcf = Vec::new();
        assert_eq!(write_vcf_from_gmap(out.as_slice(), &mut vcf, "sample", "2020-01-01").unwrap(), 5);
    }

    #[test]
    fn compress_rejects_short_location() {
        assert!(compress_alignments(">NM_1 10\n0\tA 1 a\t+chr1:5\n".as_bytes(), Vec::<u8>::new()).is_err());
    }
}
