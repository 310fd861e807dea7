//! ndproxyd - answer IPv6 Neighbor Solicitations on behalf of other hosts.

mod proxy;
mod rule;
mod session;
#[cfg(test)]
mod testing;

use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use ndproxy::Registry;
use ndproxy::ndp::SystemIo;
use tracing::{info, warn};

use crate::proxy::Proxy;
use crate::rule::{Action, Rule};

#[derive(Parser)]
#[command(name = "ndproxyd", version, about = "IPv6 Neighbor Discovery proxy")]
struct Cli {
    /// Interface to answer solicitations on.
    interface: String,

    /// Proxy rule: PREFIX is answered directly, PREFIX=IFACE only once
    /// IFACE has a host advertising the target. First match wins.
    #[arg(short, long = "rule", value_name = "PREFIX[=IFACE]", required = true)]
    rules: Vec<Rule>,

    /// How long to wait for an upstream advertisement, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 500)]
    timeout: u64,

    /// How long to remember an upstream answer, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 30_000)]
    ttl: u64,

    /// Put the interface in all-multicast mode while running.
    #[arg(long)]
    allmulti: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        1 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutting down");
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    // The registry is single-threaded; keep it off the async workers.
    tokio::task::block_in_place(|| run(&cli, &running))
}

fn run(cli: &Cli, running: &AtomicBool) -> anyhow::Result<()> {
    let mut registry = Registry::new(SystemIo::new());

    let downstream = registry
        .open_capture_socket(&cli.interface)
        .with_context(|| format!("cannot proxy on {}", cli.interface))?;

    for rule in &cli.rules {
        if let Action::Forward(upstream) = &rule.action
            && let Err(e) = registry.open_icmp_socket(upstream)
        {
            warn!(upstream = %upstream, error = %e, "upstream not ready, will retry");
        }
    }

    let proxy = Rc::new(Proxy::new(
        cli.rules.clone(),
        Duration::from_millis(cli.timeout),
        Duration::from_millis(cli.ttl),
    ));
    registry.set_handler(downstream, proxy.clone())?;

    let restore = if cli.allmulti {
        Some(registry.set_allmulti(downstream, true)?)
    } else {
        None
    };

    for rule in &cli.rules {
        info!(interface = %cli.interface, rule = %rule, "proxying");
    }

    let result = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }
        match registry.poll_once() {
            Ok(()) => {}
            // Signal delivery interrupts the wait; the flag decides.
            Err(ndproxy::Error::Wait(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
        proxy.expire(&mut registry, Instant::now());
    };

    if let Some(prior) = restore
        && let Err(e) = registry.set_allmulti(downstream, prior)
    {
        warn!(interface = %cli.interface, error = %e, "failed to restore all-multicast flag");
    }

    result.context("event loop failed")
}
