// src/generate.rs

//! Command generation: grouping records and expanding the template.
//!
//! Split mode expands one command per record, binding the regex tokens as
//! `{0}..{k-1}` and the record as `{Line}`. N-line mode collects groups of
//! records, binding each as `{0}..{N-1}` and their field-separated join as
//! `{Line}`; a final partial group is still emitted.

use anyhow::Result;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{Grouping, Settings};
use crate::input::RecordScanner;
use crate::template::{Bindings, Template};

/// Spawn the scanner/generator task.
///
/// Records are read from `reader` and expanded into command strings on the
/// returned channel. The channel closes when input is exhausted or the
/// consumer goes away; the join handle resolves to an error on fatal
/// scanner failures.
pub fn spawn_generator<R>(
    settings: &Settings,
    template: Template,
    reader: R,
) -> (mpsc::Receiver<String>, JoinHandle<Result<()>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let grouping = settings.grouping.clone();
    let record_sep = settings.record_sep.clone();
    let field_sep = settings.field_sep.clone();

    let handle = tokio::spawn(async move {
        let mut scanner = RecordScanner::new(reader, record_sep);

        match grouping {
            Grouping::Split(re) => {
                while let Some(record) = scanner.next_record().await? {
                    let tokens: Vec<String> =
                        re.split(&record).map(str::to_string).collect();
                    let bindings = Bindings::new(tokens, record);
                    if tx.send(template.render(&bindings)).await.is_err() {
                        // Consumers are gone (cancellation); stop reading.
                        break;
                    }
                }
            }
            Grouping::Lines(n) => {
                let mut group: Vec<String> = Vec::with_capacity(n);
                let mut done = false;
                while !done {
                    match scanner.next_record().await? {
                        Some(record) => {
                            group.push(record);
                            if group.len() < n {
                                continue;
                            }
                        }
                        None => {
                            done = true;
                            if group.is_empty() {
                                break;
                            }
                        }
                    }
                    let lines = std::mem::take(&mut group);
                    let joined = lines.join(&field_sep);
                    let bindings = Bindings::new(lines, joined);
                    if tx.send(template.render(&bindings)).await.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("generator finished");
        Ok(())
    });

    (rx, handle)
}
