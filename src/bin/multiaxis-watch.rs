//! Prints every event from the first multi-axis controller found.
//!
//! Set `RUST_LOG` to see discovery and read-loop diagnostics.

#[cfg(target_os = "windows")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;

    use multiaxis_hid::{observe_controller, HidAdapter, WindowsAdapter};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let adapter: Arc<dyn HidAdapter> = Arc::new(WindowsAdapter::new()?);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    runtime.block_on(async {
        let mut stream = observe_controller(adapter);
        while let Some(event) = stream.recv().await {
            if event.buttons.is_empty() {
                println!("Buttons pressed: -");
            } else {
                let buttons: Vec<String> =
                    event.buttons.iter().map(|b| b.to_string()).collect();
                println!("Buttons pressed: {}", buttons.join(", "));
            }
            println!(
                "Translate: [{}, {}, {}]",
                event.translation.x, event.translation.y, event.translation.z
            );
            println!(
                "Rotate:    [{}, {}, {}]",
                event.rotation.x, event.rotation.y, event.rotation.z
            );
        }
    });

    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("multiaxis-watch requires the Windows HID parser; no adapter exists for this platform yet.");
    std::process::exit(1);
}
