use std::error::Error;
use std::io::Cursor;

use fanout::input::RecordScanner;

type TestResult = Result<(), Box<dyn Error>>;

async fn collect(input: &[u8], sep: Option<&[u8]>) -> Result<Vec<String>, Box<dyn Error>> {
    let mut scanner = RecordScanner::new(Cursor::new(input.to_vec()), sep.map(<[u8]>::to_vec));
    let mut records = Vec::new();
    while let Some(record) = scanner.next_record().await? {
        records.push(record);
    }
    Ok(records)
}

#[tokio::test]
async fn newline_records_strip_the_terminator() -> TestResult {
    let records = collect(b"a\nb\nc\n", None).await?;
    assert_eq!(records, vec!["a", "b", "c"]);
    Ok(())
}

#[tokio::test]
async fn final_record_without_terminator_is_delivered() -> TestResult {
    let records = collect(b"a\nb", None).await?;
    assert_eq!(records, vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn crlf_line_endings_are_stripped() -> TestResult {
    let records = collect(b"a\r\nb\r\n", None).await?;
    assert_eq!(records, vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn empty_lines_are_empty_records() -> TestResult {
    let records = collect(b"a\n\nb\n", None).await?;
    assert_eq!(records, vec!["a", "", "b"]);
    Ok(())
}

#[tokio::test]
async fn custom_separator_stays_on_the_record() -> TestResult {
    let records = collect(b"x--y--z", Some(b"--")).await?;
    assert_eq!(records, vec!["x--", "y--", "z"]);
    Ok(())
}

#[tokio::test]
async fn custom_separator_final_record_may_end_with_it() -> TestResult {
    let records = collect(b"x;y;", Some(b";")).await?;
    assert_eq!(records, vec!["x;", "y;"]);
    Ok(())
}

#[tokio::test]
async fn empty_input_yields_no_records() -> TestResult {
    let records = collect(b"", None).await?;
    assert!(records.is_empty());
    Ok(())
}

#[tokio::test]
async fn record_larger_than_initial_buffer_is_processed() -> TestResult {
    // Well past the 16 KiB initial capacity.
    let big = "x".repeat(100_000);
    let input = format!("{big}\nshort\n");
    let records = collect(input.as_bytes(), None).await?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].len(), 100_000);
    assert_eq!(records[1], "short");
    Ok(())
}

#[tokio::test]
async fn multibyte_separator_split_across_reads_is_found() -> TestResult {
    // Force the separator to straddle internal refills by padding the first
    // record past the initial buffer capacity.
    let first = "a".repeat(20_000);
    let input = format!("{first}==b==");
    let records = collect(input.as_bytes(), Some(b"==")).await?;
    assert_eq!(records.len(), 2);
    assert!(records[0].ends_with("=="));
    assert_eq!(records[0].len(), 20_002);
    assert_eq!(records[1], "b==");
    Ok(())
}
