mod auth;
mod config;
mod db;
mod eligibility;
mod error;
mod ipc;
mod lock;
mod logging;
mod model;
mod progress;
mod report;
mod store;

use std::io::{self, BufRead, Write};

fn write_line(out: &mut impl Write, value: &serde_json::Value) {
    let _ = writeln!(
        out,
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
}

fn main() {
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("creditd: {e:#}");
            std::process::exit(2);
        }
    };
    logging::init_logging(&cfg.log_filter, cfg.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "creditd starting");

    let mut state = ipc::AppState::default();
    if let Some(ws) = cfg.workspace.as_deref() {
        // Startup continues without a workspace; the client can select one.
        if let Err(e) = ipc::open_workspace(&mut state, ws) {
            tracing::error!(workspace = %ws.display(), error = ?e, "startup workspace open failed");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                write_line(
                    &mut stdout,
                    &serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    }),
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
        for ev in ipc::drain_events(&mut state) {
            write_line(&mut stdout, &ev);
        }
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, exiting");
}
