// src/exec/capture.rs

//! Captured stdout of one command.
//!
//! Output up to a threshold is held in memory; anything larger is spilled
//! to a temp file. The temp file is owned by the capture and removed when
//! the capture is dropped, so a consumer that forgets to drain it still
//! cannot leak the file.

use std::io::Read;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// How many leading stdout bytes are retained for display.
const HEAD_LEN: usize = 20;

/// Captured stdout, either fully in memory or backed by a temp file.
pub enum CapturedOutput {
    Memory(Vec<u8>),
    Spilled(NamedTempFile),
}

impl CapturedOutput {
    /// Read `reader` to completion, spilling to a temp file once more than
    /// `buffer_size` bytes have been produced.
    ///
    /// Output of exactly `buffer_size` bytes stays in memory: after the
    /// buffer fills, one extra byte is probed before committing to a spill.
    pub async fn read_from<R>(reader: &mut R, buffer_size: usize) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut head = vec![0u8; buffer_size];
        let mut filled = 0usize;
        let mut eof = false;
        while filled < buffer_size {
            let n = reader
                .read(&mut head[filled..])
                .await
                .context("reading command stdout")?;
            if n == 0 {
                eof = true;
                break;
            }
            filled += n;
        }
        head.truncate(filled);

        if !eof {
            let mut probe = [0u8; 1];
            let n = reader
                .read(&mut probe)
                .await
                .context("reading command stdout")?;
            if n > 0 {
                return Self::spill(head, probe[0], reader).await;
            }
        }

        Ok(CapturedOutput::Memory(head))
    }

    async fn spill<R>(prefix: Vec<u8>, probed: u8, reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let tmp = tempfile::Builder::new()
            .prefix(&format!("fanout.{}.", std::process::id()))
            .tempfile()
            .context("creating spill file")?;

        let clone = tmp
            .as_file()
            .try_clone()
            .context("cloning spill file handle")?;
        let mut file = tokio::fs::File::from_std(clone);
        file.write_all(&prefix).await.context("writing spill file")?;
        file.write_all(&[probed])
            .await
            .context("writing spill file")?;
        tokio::io::copy(reader, &mut file)
            .await
            .context("copying command stdout to spill file")?;
        file.flush().await.context("flushing spill file")?;

        Ok(CapturedOutput::Spilled(tmp))
    }

    /// Total captured length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            CapturedOutput::Memory(bytes) => bytes.len() as u64,
            CapturedOutput::Spilled(tmp) => {
                tmp.as_file().metadata().map(|m| m.len()).unwrap_or(0)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First bytes of the capture, for display purposes.
    pub fn head(&self) -> Vec<u8> {
        match self {
            CapturedOutput::Memory(bytes) => {
                bytes.iter().take(HEAD_LEN).copied().collect()
            }
            CapturedOutput::Spilled(tmp) => {
                let mut buf = [0u8; HEAD_LEN];
                let Ok(mut file) = tmp.reopen() else {
                    return Vec::new();
                };
                let mut n = 0;
                while n < HEAD_LEN {
                    match file.read(&mut buf[n..]) {
                        Ok(0) | Err(_) => break,
                        Ok(k) => n += k,
                    }
                }
                buf[..n].to_vec()
            }
        }
    }

    /// Copy the whole capture to `sink`.
    pub async fn copy_to<W>(&mut self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            CapturedOutput::Memory(bytes) => {
                sink.write_all(bytes)
                    .await
                    .context("writing command output")?;
                Ok(bytes.len() as u64)
            }
            CapturedOutput::Spilled(tmp) => {
                let reopened = tmp.reopen().context("reopening spill file")?;
                let mut file = tokio::fs::File::from_std(reopened);
                tokio::io::copy(&mut file, sink)
                    .await
                    .context("copying spill file to output")
            }
        }
    }

    /// Path of the backing temp file, when spilled.
    pub fn spill_path(&self) -> Option<&std::path::Path> {
        match self {
            CapturedOutput::Memory(_) => None,
            CapturedOutput::Spilled(tmp) => Some(tmp.path()),
        }
    }
}
