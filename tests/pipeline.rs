use std::error::Error;
use std::io::Cursor;

use fanout::config::{Grouping, Settings};
use fanout::drain::Summary;

type TestResult = Result<(), Box<dyn Error>>;

async fn run_pipeline(
    settings: &Settings,
    input: &str,
) -> Result<(Summary, String), Box<dyn Error>> {
    let mut out = Vec::new();
    let summary =
        fanout::execute(settings, Cursor::new(input.as_bytes().to_vec()), &mut out).await?;
    Ok((summary, String::from_utf8(out)?))
}

fn sorted_lines(s: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = s.lines().collect();
    lines.sort_unstable();
    lines
}

#[tokio::test]
async fn unordered_run_executes_every_record() -> TestResult {
    let mut settings = Settings::new("echo {}");
    settings.procs = 2;

    let (summary, out) = run_pipeline(&settings, "a\nb\nc\n").await?;
    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.failures, 0);
    assert_eq!(sorted_lines(&out), vec!["a", "b", "c"]);
    Ok(())
}

#[tokio::test]
async fn ordered_run_preserves_input_order() -> TestResult {
    let mut settings = Settings::new("echo {}");
    settings.procs = 4;
    settings.ordered = true;

    let (summary, out) = run_pipeline(&settings, "a\nb\nc\n").await?;
    assert_eq!(summary.exit_code, 0);
    assert_eq!(out, "a\nb\nc\n");
    Ok(())
}

#[tokio::test]
async fn ordered_output_is_independent_of_parallelism() -> TestResult {
    let input: String = (0..20).map(|i| format!("line-{i}\n")).collect();
    let mut settings = Settings::new("echo {}");
    settings.procs = 8;
    settings.ordered = true;

    let (_, out) = run_pipeline(&settings, &input).await?;
    assert_eq!(out, input);
    Ok(())
}

#[tokio::test]
async fn default_split_binds_whitespace_tokens() -> TestResult {
    let mut settings = Settings::new("echo {1} {0}");
    settings.procs = 2;

    let (summary, out) = run_pipeline(&settings, "x y\nz w\n").await?;
    assert_eq!(summary.exit_code, 0);
    assert_eq!(sorted_lines(&out), vec!["w z", "y x"]);
    Ok(())
}

#[tokio::test]
async fn failing_commands_set_the_worst_exit_code() -> TestResult {
    let mut settings = Settings::new("exit 3");
    settings.procs = 2;

    let (summary, out) = run_pipeline(&settings, "one\ntwo\n").await?;
    assert_eq!(summary.exit_code, 3);
    assert_eq!(summary.failures, 2);
    assert!(out.is_empty());
    Ok(())
}

#[tokio::test]
async fn the_worst_exit_code_wins_across_commands() -> TestResult {
    let settings = Settings::new("exit {}");
    let (summary, _) = run_pipeline(&settings, "0\n7\n2\n").await?;
    assert_eq!(summary.exit_code, 7);
    assert_eq!(summary.failures, 2);
    Ok(())
}

#[tokio::test]
async fn retries_recover_a_flaky_command() -> TestResult {
    let dir = tempfile::tempdir()?;
    let counter = dir.path().join("attempts");
    let template = format!(
        "echo {{}} >> {path}; test $(wc -l < {path}) -ge 3",
        path = counter.display()
    );

    let mut settings = Settings::new(template);
    settings.retries = 2;

    let (summary, _) = run_pipeline(&settings, "x\n").await?;
    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.failures, 0);
    Ok(())
}

#[tokio::test]
async fn large_output_round_trips_through_the_spill_path() -> TestResult {
    let mut settings = Settings::new("seq 1 {}");
    settings.buffer_size = 1024;

    let (summary, out) = run_pipeline(&settings, "2000\n").await?;
    assert_eq!(summary.exit_code, 0);
    let expected: String = (1..=2000).map(|i| format!("{i}\n")).collect();
    assert_eq!(out, expected);
    Ok(())
}

#[tokio::test]
async fn identity_command_round_trips_the_input() -> TestResult {
    let mut settings = Settings::new("echo {Line}");
    settings.grouping = Grouping::Lines(1);
    settings.ordered = true;

    let input = "first\nsecond\nthird\n";
    let (_, out) = run_pipeline(&settings, input).await?;
    assert_eq!(out, input);
    Ok(())
}

#[tokio::test]
async fn nline_grouping_joins_records_and_emits_the_partial_group() -> TestResult {
    let mut settings = Settings::new("echo {0}-{1}:{Line}");
    settings.grouping = Grouping::Lines(2);
    settings.ordered = true;
    settings.procs = 2;

    let (summary, out) = run_pipeline(&settings, "a\nb\nc\nd\ne\n").await?;
    assert_eq!(summary.exit_code, 0);
    assert_eq!(out, "a-b:a b\nc-d:c d\ne-:e\n");
    Ok(())
}

#[tokio::test]
async fn nline_grouping_honours_the_field_separator() -> TestResult {
    let mut settings = Settings::new("echo {Line}");
    settings.grouping = Grouping::Lines(3);
    settings.field_sep = "_".to_string();

    let (_, out) = run_pipeline(&settings, "a\nb\nc\n").await?;
    assert_eq!(out, "a_b_c\n");
    Ok(())
}

#[tokio::test]
async fn emission_indices_are_sequential() -> TestResult {
    let mut settings = Settings::new("echo $PROCESS_I");
    settings.ordered = true;
    settings.procs = 3;

    let (_, out) = run_pipeline(&settings, "a\nb\nc\n").await?;
    assert_eq!(out, "0\n1\n2\n");
    Ok(())
}

#[tokio::test]
async fn stop_on_error_aborts_after_the_first_failure() -> TestResult {
    let mut settings = Settings::new("{}");
    settings.stop_on_error = true;

    let (summary, _) = run_pipeline(&settings, "true\nfalse\ntrue\n").await?;
    assert_eq!(summary.exit_code, 1);
    assert_eq!(summary.failures, 1);
    Ok(())
}

#[tokio::test]
async fn dry_run_prints_commands_without_executing() -> TestResult {
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("ran");
    let template = format!("touch {} && echo {{}}", marker.display());

    let mut settings = Settings::new(template.clone());
    settings.dry_run = true;

    let (summary, out) = run_pipeline(&settings, "a\nb\n").await?;
    assert_eq!(summary.exit_code, 0);
    let expected = format!(
        "{}\n{}\n",
        template.replace("{}", "a"),
        template.replace("{}", "b")
    );
    assert_eq!(out, expected);
    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn empty_input_produces_no_commands_and_exits_clean() -> TestResult {
    let settings = Settings::new("echo {}");
    let (summary, out) = run_pipeline(&settings, "").await?;
    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.failures, 0);
    assert!(out.is_empty());
    Ok(())
}

#[tokio::test]
async fn custom_record_separator_flows_through_the_pipeline() -> TestResult {
    let mut settings = Settings::new("printf '<{}>'");
    settings.record_sep = Some(b";".to_vec());
    settings.ordered = true;

    let (_, out) = run_pipeline(&settings, "a;b;c").await?;
    assert_eq!(out, "<a;><b;><c>");
    Ok(())
}
