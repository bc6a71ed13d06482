//! Two named loops share one elastic pool for blocking work; a queue
//! consumer shuts down cleanly with the rest of the system.
//!
//! Run with `cargo run -p tether --example named_loops`.

use std::thread;
use std::time::Duration;

use futures::executor::block_on;
use tether::context::{self, ExecutionContext};
use tether::logging;
use tether::patcher::{BufferedResponse, PatchableResponse, patch_creation_timestamps};
use tether::system::BridgeSystem;
use tether::{SystemError, run_sync, try_run_sync};
use tracing::info;

fn fetch_listing(id: u32) -> Result<BufferedResponse, anyhow::Error> {
    // Stand-in for a blocking HTTP client
    thread::sleep(Duration::from_millis(50));
    Ok(BufferedResponse::new(format!(
        "<item><id>{id}</id><creationTimestamp>2023-01-01 10:00:0{id}</creationTimestamp></item>"
    )))
}

fn main() -> Result<(), SystemError> {
    logging::init_development();
    let system = BridgeSystem::global();

    let api = system.get_or_create_loop("api")?;
    let jobs = system.get_or_create_loop("jobs")?;

    let requests: Vec<_> = (1..=3u32)
        .map(|id| {
            ExecutionContext::new().with_value("request_id", id).run(|| {
                api.spawn(async move {
                    let mut response = try_run_sync(move || fetch_listing(id)).await?;
                    let seen = run_sync(|| context::get::<u32>("request_id").map(|v| *v)).await?;
                    patch_creation_timestamps(&mut response);
                    info!(request = ?seen, body = %String::from_utf8_lossy(response.body()), "request served");
                    Ok::<_, anyhow::Error>(())
                })
            })
        })
        .collect();

    let (tx, rx) = flume::unbounded::<String>();
    let consumer = jobs.spawn(async move {
        let mut handled = 0usize;
        while let Some(job) = tether::receive_from_queue(rx.clone()).await? {
            info!(%job, "job handled");
            handled += 1;
        }
        Ok::<_, tether::QueueError>(handled)
    });

    for n in 0..5 {
        tx.send(format!("job-{n}")).map_err(|err| SystemError::Other(err.into()))?;
    }

    for request in requests {
        match block_on(request) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "request failed"),
            Err(err) => tracing::error!(error = %err, "request task aborted"),
        }
    }
    thread::sleep(Duration::from_millis(200));

    system.shutdown()?;
    match block_on(consumer) {
        Ok(Ok(handled)) => info!(handled, "consumer finished"),
        Ok(Err(err)) => tracing::error!(error = %err, "consumer failed"),
        // The loop was torn down while the consumer was suspended
        Err(err) => info!(cancelled = err.is_cancelled(), "consumer stopped with its loop"),
    }
    Ok(())
}
