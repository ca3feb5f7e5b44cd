use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the output device called `device_name`, or the host's default output.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let Some(target) = device_name else {
        return host
            .default_output_device()
            .context("No default output device");
    };

    host.output_devices()
        .context("Failed to list output devices")?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No output device named '{target}'"))
}

/// One line per output device, with its default channel count and rate.
pub fn get_available_outputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host.default_output_device().and_then(|d| d.name().ok());

    let mut device_names = Vec::new();
    for device in host.output_devices().context("Failed to list output devices")? {
        let Ok(name) = device.name() else {
            continue;
        };
        let mut line = match device.default_output_config() {
            Ok(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
            Err(_) => format!(" * {name}(no default config)"),
        };
        if default_device.as_deref() == Some(name.as_str()) {
            line.push_str(" [default]");
        }
        device_names.push(line);
    }
    Ok(device_names.join("\n"))
}
