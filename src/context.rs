//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu surface, device, queue, and surface
//! configuration for one window. It is created once when the rendering
//! context is initialized and passed by reference to everything that
//! touches the GPU.

use std::sync::Arc;

use winit::window::Window;

/// Error raised while acquiring the GPU context.
///
/// These are platform/context failures in the spec's taxonomy: fatal to
/// rendering until retried, never fatal to the process.
#[derive(Debug)]
pub enum ContextError {
    /// No suitable GPU adapter was found.
    AdapterNotFound,
    /// The logical device could not be created.
    Device(wgpu::RequestDeviceError),
    /// The window surface could not be created.
    Surface(wgpu::CreateSurfaceError),
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextError::AdapterNotFound => write!(f, "no suitable GPU adapter found"),
            ContextError::Device(e) => write!(f, "failed to create GPU device: {}", e),
            ContextError::Surface(e) => write!(f, "failed to create window surface: {}", e),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContextError::Device(e) => Some(e),
            ContextError::Surface(e) => Some(e),
            ContextError::AdapterNotFound => None,
        }
    }
}

/// Core GPU context holding wgpu resources for one window.
pub struct GpuContext {
    /// The surface for presenting rendered frames to the window.
    pub surface: wgpu::Surface<'static>,
    /// The adapter the device was created from, kept for capability queries.
    pub adapter: wgpu::Adapter,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a new GPU context from a winit window.
    ///
    /// Performs the full wgpu bring-up: instance, surface, adapter,
    /// device/queue, and surface configuration with an sRGB format and
    /// Fifo present mode.
    pub fn new(window: Arc<Window>) -> Result<Self, ContextError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(ContextError::Surface)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|_| ContextError::AdapterNotFound)?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Aspis Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(ContextError::Device)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            adapter,
            device,
            queue,
            config,
        })
    }

    /// Resize the surface to new dimensions.
    ///
    /// Ignores zero-sized dimensions to avoid wgpu validation errors
    /// during window minimize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_error_display() {
        let err = ContextError::AdapterNotFound;
        assert!(format!("{}", err).contains("adapter"));
    }
}
