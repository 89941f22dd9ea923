// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `talon logs`: tail the daemon's own log file.
//!
//! Reads `{state_dir}/daemon.log` (or `TALON_LOG_PATH`) directly rather than
//! going through the daemon — the file is append-only and readable whether
//! or not talond is currently up.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use clap::Args;

use crate::poll::{Poller, Tick};

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to print.
    #[arg(short = 'n', long, default_value = "50")]
    pub lines: usize,
    /// Keep printing new lines as they're written.
    #[arg(long, short)]
    pub follow: bool,
}

pub async fn run(args: LogsArgs) -> anyhow::Result<()> {
    let path = crate::env::log_path()?;
    let Ok(mut file) = File::open(&path) else {
        println!("no log file at {}", path.display());
        return Ok(());
    };

    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    for line in tail_lines(&contents, args.lines) {
        println!("{line}");
    }

    if !args.follow {
        return Ok(());
    }

    let mut offset = file.stream_position()?;
    let mut poller = Poller::new(Duration::from_millis(300), None);
    loop {
        match poller.tick().await {
            Tick::Interrupted => return Ok(()),
            Tick::Timeout => return Ok(()),
            Tick::Ready => {
                let metadata = file.metadata()?;
                if metadata.len() < offset {
                    // Log was rotated or truncated underneath us.
                    file.seek(SeekFrom::Start(0))?;
                    offset = 0;
                }
                if metadata.len() > offset {
                    file.seek(SeekFrom::Start(offset))?;
                    let mut chunk = String::new();
                    file.read_to_string(&mut chunk)?;
                    print!("{chunk}");
                    offset = file.stream_position()?;
                }
            }
        }
    }
}

fn tail_lines(contents: &str, n: usize) -> Vec<&str> {
    let mut lines: Vec<&str> = contents.lines().collect();
    if lines.len() > n {
        lines = lines.split_off(lines.len() - n);
    }
    lines
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
