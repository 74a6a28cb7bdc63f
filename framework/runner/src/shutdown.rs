use tokio::signal;
use thread_lab_core::prelude::ShutdownHandle;

/// Raise the returned handle when the process receives Ctrl-C.
///
/// The listener lives on `runtime`, so the runtime must be kept alive for as long as the handle is
/// needed.
pub fn start_shutdown_listener(
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, interrupting the current run...");
                listener_handle.shutdown();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {e:?}"),
        }
    });

    Ok(handle)
}
