// Library-level runs of both pipelines on temporary directories

use code_census::distance::{read_distances, write_distances, DistanceBatchRunner};
use code_census::edit_distance::Algorithm;
use code_census::grouping::{group_metric, Metric};
use code_census::join::join_files;
use code_census::line_counter::LineCounter;
use code_census::model::Tier;
use code_census::snapshot::SnapshotPairer;
use code_census::stats::{summarize_groups, TestOutcome};
use code_census::table::Table;
use std::fs;
use std::path::Path;

fn write_project(root: &Path, key: &str, file: &str, body: &str) {
    let dir = root.join(key);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), body).unwrap();
}

#[test]
fn test_count_join_group_end_to_end() {
    let corpus = tempfile::tempdir().unwrap();
    write_project(corpus.path(), "alice/small", "A.java", "class A {\n\n}\n");
    write_project(corpus.path(), "bob/big", "B.java", "a\nb\nc\nd\ne\n");
    write_project(corpus.path(), "carol/docs", "README.md", "# hi\n");

    let counts = corpus.path().join("code_lines.csv");
    let report = LineCounter::default().count_to_file(corpus.path(), &counts).unwrap();
    assert_eq!(report.counts.len(), 3);
    assert_eq!(report.total_lines(), 7);

    let work = tempfile::tempdir().unwrap();
    let projects = work.path().join("projects.csv");
    fs::write(
        &projects,
        "name,stars_region,forks_region,watchers_region,bugfix\n\
         alice/small,1,1,1,4\n\
         bob/big,3,3,3,9\n\
         carol/docs,2,2,2,1\n\
         dave/missing,1,2,3,7\n",
    )
    .unwrap();

    let joined = work.path().join("projects_with_codelines.csv");
    let summary = join_files(&projects, &counts, &joined).unwrap();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.matched, 3);
    assert_eq!(summary.unmatched, vec!["dave/missing"]);

    let table = Table::read(&joined).unwrap();
    assert_eq!(table.headers.last().map(String::as_str), Some("code_lines"));

    let lines = group_metric(&table.rows, Metric::CodeLines);
    assert_eq!(lines.get(Tier::Lesser), &[2]);
    assert_eq!(lines.get(Tier::Medium), &[0]);
    assert_eq!(lines.get(Tier::High), &[5]);
    assert_eq!(lines.other, 1);

    let bugfix = group_metric(&table.rows, Metric::Bugfix);
    let result = summarize_groups(&bugfix);
    // single-row tiers are too small for either test
    assert!(matches!(
        result.tier(Tier::High).unwrap().normality,
        TestOutcome::NotComputed(_)
    ));
    assert!(result.comparison.computed().is_some());
}

#[test]
fn test_single_project_reaches_lesser_tier() {
    let work = tempfile::tempdir().unwrap();
    let projects = work.path().join("projects.csv");
    let counts = work.path().join("counts.csv");
    let joined = work.path().join("joined.csv");
    fs::write(&projects, "name,stars_region,forks_region,watchers_region\na,1,1,1\n").unwrap();
    fs::write(&counts, "directory_name,code_lines\na,100\n").unwrap();

    join_files(&projects, &counts, &joined).unwrap();
    let table = Table::read(&joined).unwrap();
    let groups = group_metric(&table.rows, Metric::CodeLines);
    assert_eq!(groups.lesser, vec![100]);
    assert!(groups.medium.is_empty() && groups.high.is_empty());
}

#[test]
fn test_distances_round_trip_through_csv() {
    let root = tempfile::tempdir().unwrap();
    let folder = root.path().join("commit1");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("Foo_original.java"), "kitten").unwrap();
    fs::write(folder.join("Foo_recent.java"), "sitting").unwrap();
    fs::write(folder.join("Bar_original.java"), "same").unwrap();
    fs::write(folder.join("Bar_recent.java"), "same").unwrap();
    fs::write(folder.join("Lonely_original.java"), "x").unwrap();

    for algorithm in [Algorithm::TwoRow, Algorithm::Matrix] {
        let report = DistanceBatchRunner::new(SnapshotPairer::default(), algorithm.strategy())
            .run(root.path())
            .unwrap();
        assert_eq!(report.distances(), vec![0, 3]);

        let out = tempfile::tempdir().unwrap();
        let csv = out.path().join("levenshtein_distances.csv");
        write_distances(&report.records, &csv).unwrap();
        let column = read_distances(&csv).unwrap();
        assert_eq!(column.values, vec![0, 3]);
        assert_eq!(column.skipped, 0);
    }
}
