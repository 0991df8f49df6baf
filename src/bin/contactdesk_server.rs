//!
//! contactdesk server binary
//! -------------------------
//! Command-line entry point for the admin console HTTP server.
//! Configuration comes from CONTACTDESK_* environment variables; flags override them.

use anyhow::Result;
use std::env;
use std::path::PathBuf;

use contactdesk::config::ConsoleConfig;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber; RUST_LOG overrides the info default
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("contactdesk Server\n\nUSAGE:\n  contactdesk_server [--port N] [--records PATH] [--locale TAG] [--day-boundary B]\n\nOPTIONS:\n  --port N            HTTP port (env: CONTACTDESK_HTTP_PORT, default 7880)\n  --records PATH      Contact records JSON file (env: CONTACTDESK_RECORDS)\n  --locale TAG        es-ES or en-US (env: CONTACTDESK_LOCALE, default es-ES)\n  --day-boundary B    utc, local or an offset like +02:00 (env: CONTACTDESK_DAY_BOUNDARY, default utc)\n\nENVIRONMENT:\n  CONTACTDESK_SESSION_TTL_SECS, CONTACTDESK_REQUIRE_CONFIRMATION,\n  CONTACTDESK_ADMIN_EMAIL, CONTACTDESK_ADMIN_PASSWORD, RUST_LOG\n");
        return Ok(());
    }

    let mut config = ConsoleConfig::from_env();

    // CLI arguments override environment
    if let Some(v) = arg_value(&args, "--port") {
        match v.parse::<u16>() {
            Ok(p) => config.http_port = p,
            Err(_) => anyhow::bail!("invalid --port value: {}", v),
        }
    }
    if let Some(v) = arg_value(&args, "--records") {
        config.records_path = Some(PathBuf::from(v));
    }
    if let Some(v) = arg_value(&args, "--locale") {
        config.set_locale(&v);
    }
    if let Some(v) = arg_value(&args, "--day-boundary") {
        config.set_day_boundary(&v);
    }

    contactdesk::server::run_with_config(config).await
}
