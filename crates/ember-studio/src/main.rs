use anyhow::{Context, Result};

use ember_engine::device::{self, BootstrapConfig, DeviceBundle, DevicePreference, keys};
use ember_engine::logging::{LoggingConfig, init_logging};
use ember_engine::window::{Runtime, RuntimeConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = BootstrapConfig {
        device: DevicePreference::from_env(),
        ..Default::default()
    };

    let runtime = RuntimeConfig {
        title: "Vulkan Application".to_string(),
        ..Default::default()
    };

    Runtime::run(runtime, move |window| {
        let mut pipeline = device::standard_pipeline(window, config.clone())?;
        let mut store = pipeline.build().context("device bootstrap failed")?;
        let bundle: DeviceBundle = store.take(keys::RESULT)?;

        report(&bundle);
        Ok(bundle)
    })
}

fn report(bundle: &DeviceBundle) {
    if let Some(device) = &bundle.device {
        let indices = device.queue_indices();
        if indices.is_shared() {
            log::info!("queues: graphics/present share family {}", indices.graphics);
        } else {
            log::info!(
                "queues: graphics family {}, present family {}",
                indices.graphics,
                indices.present
            );
        }
    }

    if let Some(swapchain) = &bundle.swapchain {
        let extent = swapchain.extent();
        log::info!(
            "swapchain ready: {}x{} {:?}, {} image view(s)",
            extent.width,
            extent.height,
            swapchain.format(),
            swapchain.image_views().len()
        );
    }

    log::info!("bootstrap complete: {bundle:?}");
}
