use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device with the given name, or the host's default input
/// device when no name is given.
pub fn get_or_default_input(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No default input device available"));
    };

    for device in host.input_devices()? {
        if device.name().is_ok_and(|name| name == target) {
            return Ok(device);
        }
    }
    Err(anyhow::anyhow!("No input device named '{}'", target))
}
