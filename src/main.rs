//! Command-line expect dialogs.
//!
//! ```text
//! spectcl -x 'Name' -s anonymous -x 'assword:' -s guest -x 'ftp> ' -- ftp localhost
//! ```
//!
//! Each `--expect` is awaited in turn; the `--send` with the same position is
//! sent once it matched. A timeout or EOF before a pattern fails the run.

use anyhow::{bail, Context, Result};
use clap::Parser;
use spectcl::{ExpectError, Expectations, Flow, Pattern, Session};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spectcl")]
#[command(author, version, about = "Drive an interactive program with expect/send steps", long_about = None)]
struct Args {
    /// Inactivity timeout in milliseconds (0 waits forever)
    #[arg(short, long, default_value_t = spectcl::DEFAULT_TIMEOUT_MS)]
    timeout: u64,

    /// Buffer bound in characters
    #[arg(long, default_value_t = spectcl::DEFAULT_MATCH_MAX)]
    match_max: usize,

    /// Run the command on pipes instead of a pseudo-terminal
    #[arg(long)]
    no_pty: bool,

    /// Strip ANSI escape sequences from output
    #[arg(long)]
    strip_colors: bool,

    /// Lowercase output before matching
    #[arg(long)]
    ignore_case: bool,

    /// Treat patterns as regular expressions
    #[arg(long)]
    regex: bool,

    /// Pattern to wait for (repeatable)
    #[arg(short = 'x', long = "expect", required = true)]
    expect: Vec<String>,

    /// Line to send after the expect at the same position (repeatable)
    #[arg(short, long)]
    send: Vec<String>,

    /// Command to run
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.send.len() > args.expect.len() {
        bail!("more --send than --expect steps");
    }

    let mut builder = Session::builder()
        .match_max(args.match_max)
        .strip_colors(args.strip_colors)
        .ignore_case(args.ignore_case)
        .pty(!args.no_pty);
    builder = match args.timeout {
        0 => builder.no_timeout(),
        ms => builder.timeout(Duration::from_millis(ms)),
    };

    let (program, rest) = args
        .command
        .split_first()
        .context("no command given")?;
    let session = builder
        .spawn_program(program, rest)
        .with_context(|| format!("failed to spawn {program}"))?;
    info!(program = %program, pid = ?session.pid(), "spawned");

    let result = run(&session, &args).await;

    if matches!(session.is_alive(), Ok(true)) {
        debug!("stopping child");
        let _ = session.kill();
    }
    result?;

    print!("{}", session.expect_out().buffer);
    Ok(())
}

async fn run(session: &Session, args: &Args) -> Result<()> {
    for (step, source) in args.expect.iter().enumerate() {
        let pattern = if args.regex {
            Pattern::regex(source).with_context(|| format!("bad pattern {source:?}"))?
        } else {
            Pattern::literal(source.as_str())
        };

        let list = Expectations::new()
            .on(pattern, |_, _, done| {
                done.complete();
                Flow::Complete
            })
            .on(Pattern::Timeout, |session, _, done| {
                let duration = session.config().timeout.unwrap_or_default();
                done.fail(ExpectError::Timeout { duration });
                Flow::Complete
            })
            .on(Pattern::Eof, |_, _, done| {
                done.fail(ExpectError::Eof);
                Flow::Complete
            });

        debug!(step, pattern = %source, "waiting");
        session
            .expect_async(list)
            .await
            .with_context(|| format!("step {}: waiting for {source:?}", step + 1))?;

        if let Some(line) = args.send.get(step) {
            session.send_line(line)?;
        }
    }
    Ok(())
}
