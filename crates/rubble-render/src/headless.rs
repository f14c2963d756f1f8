//! Windowless wgpu device for uploading instance buffers

use crate::context::RenderError;

/// wgpu device and queue with no surface attached
pub struct HeadlessContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub limits: wgpu::Limits,
}

impl HeadlessContext {
    /// Create a device on the default adapter, requesting its full limits
    pub async fn new() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;

        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Rubble Headless Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

        let adapter_name = adapter.get_info().name;
        log::info!("[render] headless device on '{adapter_name}'");

        Ok(Self {
            device,
            queue,
            limits,
        })
    }

    /// Blocking wrapper around [`HeadlessContext::new`]
    pub fn new_blocking() -> Result<Self, RenderError> {
        pollster::block_on(Self::new())
    }
}
