//! Tests every configured server, one after another.
//!
//! A server that fails, or whose result cannot be saved, is logged and
//! skipped; the loop always reaches the last server. Output errors inside
//! the loop are logged too, so a closed stdout never costs a saved result.

use tracing::{error, info, warn};

use crate::config::Config;
use crate::emitter::Emitter;
use crate::error::Result;
use crate::orchestrator;
use crate::store::ResultSink;
use crate::summary::Summary;

/// Run a campaign over `config.servers`, saving into `sink`.
///
/// With `quiet` set only errors and the final summary are emitted. The only
/// error returned is a failure to emit the summary.
pub async fn run(
    config: &Config,
    sink: &mut dyn ResultSink,
    emitter: &mut dyn Emitter,
    quiet: bool,
) -> Result<Summary> {
    let mut summary = Summary::default();
    info!(servers = config.servers.len(), "starting speed tests");

    for server in &config.servers {
        let name = server.display_name();
        if !quiet {
            report(name, emitter.on_starting(server));
        }

        let (result, failed) = match orchestrator::test_server(server, &config.test).await {
            Ok(result) => (result, false),
            Err(total) => {
                error!(server = name, error = %total, "server test failed");
                report(name, emitter.on_error(name, &total.to_string()));
                (total.into_result(), true)
            }
        };

        let saved = if failed && !config.storage.persist_failures {
            None
        } else {
            match sink.save(&result) {
                Ok(record) => {
                    info!(id = record.id, server = %record.result.server_name, "result saved");
                    Some(record)
                }
                Err(e) => {
                    error!(server = name, error = %e, "failed to save result");
                    report(
                        name,
                        emitter.on_error(name, &format!("failed to save result: {e}")),
                    );
                    None
                }
            }
        };

        if !quiet {
            report(name, emitter.on_result(&result));
            if let Some(record) = &saved {
                report(name, emitter.on_saved(record));
            }
        }

        summary.record(&result, failed, saved.map(|r| r.id));
    }

    info!(
        tested = summary.tested,
        saved = summary.saved,
        failed = summary.failed,
        "all tests complete"
    );
    emitter.on_summary(&summary)?;
    Ok(summary)
}

fn report(server: &str, emitted: Result<()>) {
    if let Err(e) = emitted {
        warn!(server, error = %e, "failed to write output");
    }
}
