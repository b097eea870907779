//! End-to-end CLI tests for the assemble command.

use tempfile::TempDir;

use crate::helpers::{
    READS_HEADER, output_file, read_header_of, read_rows, read_rows_of, run_fgmig, single_end_row, write_tsv,
};

const SEQUENCE: &str = "ACGTTGCAACGTTGCA";

fn reads_input(dir: &TempDir) -> std::path::PathBuf {
    let input = dir.path().join("reads.tsv");
    let mut rows = read_rows("AAAA", SEQUENCE, 5);
    let mut with_error = read_rows("CCCC", SEQUENCE, 3);
    with_error.push(single_end_row("CCCC", "ACGTTGCAACGTAGCA"));
    rows.extend(with_error);
    rows.extend(read_rows("GGGG", SEQUENCE, 1));
    write_tsv(&input, READS_HEADER, &rows);
    input
}

#[test]
fn test_assemble_command_single_end() {
    let dir = TempDir::new().unwrap();
    let input = reads_input(&dir);
    let prefix = dir.path().join("run");

    let output = run_fgmig(&[
        "assemble",
        "--input",
        input.to_str().unwrap(),
        "--output",
        prefix.to_str().unwrap(),
        "--min-reads",
        "2",
    ]);
    assert!(output.status.success(), "assemble failed: {}", String::from_utf8_lossy(&output.stderr));

    let consensus = output_file(&prefix, "consensus.txt");
    assert_eq!(
        read_header_of(&consensus),
        vec![
            "umi",
            "assembled_size",
            "true_size",
            "r1_sequence",
            "r1_quality",
            "r1_minors",
            "r2_sequence",
            "r2_quality",
            "r2_minors"
        ]
    );
    let rows = read_rows_of(&consensus);
    assert_eq!(rows.len(), 2, "the single-read group should not be assembled");
    assert_eq!(rows[0][0], "AAAA");
    assert_eq!(rows[0][1], "5");
    assert_eq!(rows[0][3], SEQUENCE);
    assert_eq!(rows[1][0], "CCCC");
    assert_eq!(rows[1][2], "4");
    assert_eq!(rows[1][3], SEQUENCE, "the majority base wins at the error position");
    assert!(rows[1][6].is_empty(), "single-end consensuses have no R2");

    let report = read_rows_of(&output_file(&prefix, "assemble.txt"));
    assert_eq!(report.iter().map(|r| r[0].as_str()).collect::<Vec<_>>(), vec!["AAAA", "CCCC"]);

    let summary_path = output_file(&prefix, "assemble_summary.txt");
    let header = read_header_of(&summary_path);
    let summary = &read_rows_of(&summary_path)[0];
    let column = |name: &str| &summary[header.iter().position(|h| h == name).unwrap()];
    assert_eq!(column("migs_total"), "3");
    assert_eq!(column("migs_assembled"), "2");
    assert_eq!(column("reads_total"), "10");
    assert_eq!(column("migs_dropped_insufficient_reads"), "1");
}

#[test]
fn test_assemble_command_paired_end_with_threads() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("pairs.tsv");
    let prefix = dir.path().join("pairs");
    let rows: Vec<Vec<String>> = ["AAAA", "CCCC", "GGGG"]
        .iter()
        .flat_map(|umi| {
            (0..3).map(move |_| {
                vec![
                    (*umi).to_string(),
                    SEQUENCE.to_string(),
                    "I".repeat(SEQUENCE.len()),
                    "TTTTGGGGCCCCAAAA".to_string(),
                    "I".repeat(16),
                ]
            })
        })
        .collect();
    write_tsv(&input, READS_HEADER, &rows);

    let output = run_fgmig(&[
        "assemble",
        "-i",
        input.to_str().unwrap(),
        "-o",
        prefix.to_str().unwrap(),
        "--threads",
        "2",
    ]);
    assert!(output.status.success(), "assemble failed: {}", String::from_utf8_lossy(&output.stderr));

    let rows = read_rows_of(&output_file(&prefix, "consensus.txt"));
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row[3], SEQUENCE);
        assert_eq!(row[6], "TTTTGGGGCCCCAAAA");
        assert_eq!(row[7].len(), 16);
    }
}
