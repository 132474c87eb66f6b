/*!
 * Lifecycle Context Demo
 *
 * Walks a context through each termination cause and prints its snapshots:
 * - Manual cancellation with a blocking wait
 * - Deadline expiry awaited asynchronously
 * - Reuse through reset
 */

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use lifecycle_ctx::monitoring::span_context;
use lifecycle_ctx::{init_tracing, LifecycleContext, Token};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let root = Token::background().with_value("service", "ctxdemo");
    let fired = Arc::new(AtomicUsize::new(0));

    // Manual cancellation
    let ctx = LifecycleContext::with_cancel(&root)?;
    {
        let _span = span_context(&ctx).entered();
        let counter = fired.clone();
        ctx.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        ctx.on_done(|| info!("cancel generation finished"));
        ctx.cancel_with_wait();
        info!(%ctx, callbacks_fired = fired.load(Ordering::SeqCst), "after cancel_with_wait");
    }
    println!("{}", serde_json::to_string_pretty(&ctx.snapshot())?);

    // Reuse the same instance with a deadline
    ctx.reset_with_timeout(&root, Duration::from_millis(50))?;
    ctx.on_timeout(|| info!("deadline passed"));
    ctx.settled().await;
    info!(%ctx, "after deadline");
    println!("{}", serde_json::to_string_pretty(&ctx.snapshot())?);

    // Values flow through the wrapped token
    let service = ctx.value_as::<&str, _>(&"service");
    info!(service = ?service.as_deref(), "value lookup");

    Ok(())
}
