//! Adder service: one dispatch loop answering `a + b`, one client issuing calls.
//!
//! Run with `RUST_LOG=debug` to watch registration and correlation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::{call_site, ServiceTags};
use tether_fabric::MemoryTransport;
use tether_rpc::{CallDriver, CallDriverBuilder, DispatchLoop, DispatchLoopBuilder};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct AddRequest {
    a: u64,
    b: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AddResponse {
    result: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let transport = MemoryTransport::new();
    let tags = ServiceTags::new("AddRequest", "AddResponse")?;

    let server: Arc<DispatchLoop<AddRequest, AddResponse>> =
        Arc::new(DispatchLoopBuilder::new(tags.clone()).build(&transport)?);
    let running = Arc::new(AtomicBool::new(true));

    let worker = {
        let server = Arc::clone(&server);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let served = server.serve_once(
                    |req: &AddRequest, resp: &mut AddResponse| {
                        resp.result = req.a + req.b;
                        true
                    },
                    Duration::from_millis(100),
                );
                if let Err(e) = served {
                    tracing::trace!("idle: {e}");
                }
            }
        })
    };

    let mut client: CallDriver<AddRequest, AddResponse> = CallDriverBuilder::new(tags)
        .app_name("add-client")
        .call_site(call_site!())
        .build(&transport)?;

    for i in 0..5 {
        let request = AddRequest { a: i, b: i * 2 };
        println!("client sending {} + {}", request.a, request.b);
        match client.call(request, Duration::from_secs(3)) {
            Ok(response) => println!("client received {}", response.result),
            Err(e) => println!("client call failed: {e}"),
        }
    }

    running.store(false, Ordering::SeqCst);
    worker.join().map_err(|_| "server thread panicked")?;
    println!("served {} client(s)", server.registry().len());
    Ok(())
}
