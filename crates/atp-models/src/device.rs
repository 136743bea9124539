use candle_core::Device;

pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            tracing::info!("model device: Metal (MPS)");
            return dev;
        }
    }
    tracing::info!("model device: CPU");
    Device::Cpu
}
