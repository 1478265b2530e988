use std::io::{self, BufRead, Write};

use railbook_engine::{dispatch_line, Config, Dispatch, TicketEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "railbook=info".into()),
        )
        // Replies own stdout; diagnostics go to stderr.
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = Config::load()?;
    let mut engine = TicketEngine::new(&config);
    tracing::info!("railbook engine ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match dispatch_line(&mut engine, &line) {
            Dispatch::Reply(reply) => writeln!(stdout, "{reply}")?,
            Dispatch::Exit => {
                writeln!(stdout, "bye")?;
                break;
            }
        }
    }
    Ok(())
}
