use std::fs;
use std::path::Path;

use bucket_transfer::{document_transfer, DocumentOptions, MoleculeFilter, Naming, TransferType};
use bucket_transfer::historic::read_historic_log_file;

const LISTING: &str = "\
gs://src/colon/HTAPP-272-SMP-4831_scRNA/HTAPP-272-SMP-4831_none_S1_R1_001.fastq.gz:
    Content-Length:         1000
    Hash (md5):             aaa==
    ACL:                    []
gs://src/colon/HTAPP-272-SMP-4831_scRNA/HTAPP-272-SMP-4831_none_S1_R2_001.fastq.gz:
    Content-Length:         2000
    Hash (md5):             bbb==
    ACL:                    []
gs://src/colon/HTAPP-272-SMP-4831_scRNA/.DS_Store:
    Content-Length:         10
    Hash (md5):             ccc==
    ACL:                    []
gs://src/colon/run1/HTAPP-272-SMP-4831_RNA/HTAPP-272-SMP-4831_RNA_x.bam:
    Content-Length:         3000
    Hash (md5):             ddd==
    ACL:                    []
gs://src/colon/run1/HTAPP-272-SMP-4831_WES/HTAPP-272-SMP-4831_WES_x.bam:
    Content-Length:         4000
    Hash (md5):             eee==
    ACL:                    []
gs://src/colon/HTAPP-999-SMP-1_scRNA/HTAPP-999-SMP-1_none_S1_R1_001.fastq.gz:
    Content-Length:         5000
    Hash (md5):             fff==
    ACL:                    []
";

const HISTORIC: &str = "File\tHash(MD5)\tSize(bytes)\tDate\n\
gs://src/colon/HTAPP-272-SMP-4831_scRNA/HTAPP-272-SMP-4831_none_S1_R1_001.fastq.gz\taaa==\t1000\t2020-01-01\n";

fn options(dir: &Path, naming: Naming) -> DocumentOptions {
    DocumentOptions {
        tumor: "colon".to_string(),
        bucket: "gs://dst/colon/".to_string(),
        ls_file: dir.join("ls.txt"),
        hist: Some(dir.join("hist.txt")),
        hist_temp: dir.join("hist_temp.txt"),
        cmd_out: dir.join("cmd.sh"),
        document_out: dir.join("doc.txt"),
        naming,
        qc_ids: None,
        hold_ids: None,
        types: vec![TransferType::Fastq, TransferType::Bam],
        molecule: Some(MoleculeFilter::BulkRna),
        exclude_keys: Vec::new(),
    }
}

fn write_inputs(dir: &Path) {
    fs::write(dir.join("ls.txt"), LISTING).unwrap();
    fs::write(dir.join("hist.txt"), HISTORIC).unwrap();
}

#[test]
fn htan_transfer_is_documented() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(dir.path().join("map.tsv"), "HTAPP-272\t11\nSMP-4831\t22\n").unwrap();

    let mut opts = options(dir.path(), Naming::Htan(dir.path().join("map.tsv")));
    opts.qc_ids = Some(dir.path().join("qc.tsv"));
    fs::write(dir.path().join("qc.tsv"), "colon\tHTAPP-272\tSMP-4831\n").unwrap();

    let success = document_transfer(&opts).unwrap();
    // HTAPP-999-SMP-1 is not a known id
    assert!(!success);

    let commands = fs::read_to_string(dir.path().join("cmd.sh")).unwrap();
    let commands: Vec<&str> = commands.lines().collect();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].starts_with("gsutil -m cp -r -L colon-"));
    assert!(commands[0].ends_with(
        "gs://src/colon/HTAPP-272-SMP-4831_scRNA/HTAPP-272-SMP-4831_none_S1_R2_001.fastq.gz \
         gs://dst/colon/HTA1_11_22_HTAPP-272-SMP-4831_none_S1_R2_001.fastq.gz"));
    assert!(commands[1].ends_with("gs://dst/colon/HTA1_11_22_HTAPP-272-SMP-4831_RNA_x.bam"));

    let doc = fs::read_to_string(dir.path().join("doc.txt")).unwrap();
    assert!(doc.contains("Number of files transferred: 2\n"));
    assert!(doc.contains("(5000 bytes)"));
    assert!(doc.contains("Types of files transferred: bam,fastq.gz\n"));

    assert!(dir.path().join("hist_temp.txt").exists());
    let hist = read_historic_log_file(&dir.path().join("hist.txt")).unwrap();
    assert_eq!(hist.len(), 3);
    let r1 = &hist["gs://src/colon/HTAPP-272-SMP-4831_scRNA/HTAPP-272-SMP-4831_none_S1_R1_001.fastq.gz"];
    assert_eq!(r1.date.as_deref(), Some("2020-01-01"));
}

#[test]
fn anonymized_transfer_updates_registry() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let rename = dir.path().join("rename.csv");

    let mut opts = options(dir.path(), Naming::Anonymized(rename.clone()));
    opts.molecule = None;
    opts.types = vec![TransferType::Fastq];

    assert!(document_transfer(&opts).unwrap());

    let commands = fs::read_to_string(dir.path().join("cmd.sh")).unwrap();
    assert!(commands.contains("gs://dst/colon/HTA1-1-1_HTAPP-272-SMP-4831_none_S1_R2_001.fastq.gz"));
    assert!(commands.contains("gs://dst/colon/HTA1-2-2_HTAPP-999-SMP-1_none_S1_R1_001.fastq.gz"));

    let registry = fs::read_to_string(&rename).unwrap();
    assert!(registry.contains("_sample_count,2"));
    assert!(registry.contains("HTAPP-272,HTA1-1"));
    assert!(dir.path().join("rename-KEY.csv").exists());
}

#[test]
fn existing_temp_log_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(dir.path().join("hist_temp.txt"), "old").unwrap();

    let opts = options(dir.path(), Naming::Keep);
    let err = document_transfer(&opts).unwrap_err();
    let err = err.downcast_ref::<bucket_transfer::TransferError>().unwrap();
    assert_eq!(err.exit_code(), 305);
    assert!(!dir.path().join("cmd.sh").exists());
}
