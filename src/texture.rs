//! Texture resource management: image decode, GPU upload, free, and
//! single-pixel readback.
//!
//! The toolkit owns [`TextureDesc`] records; the backend owns the GPU
//! textures behind them, keyed by [`TextureId`]. Decode failures never
//! fault the caller: the descriptor's `failed` flag is set and draws
//! against it take the missing-image placeholder path.

use std::collections::HashMap;
use std::path::Path;

use log::warn;
use wgpu::util::DeviceExt;

use crate::context::GpuContext;
use crate::pipeline::Pipeline;
use crate::state::TextureId;
use crate::types::Color;

/// Error raised while decoding or validating an image.
#[derive(Debug)]
pub enum TextureError {
    /// The image bytes could not be decoded.
    Decode(image::ImageError),
    /// The decoded image exceeds the device's 2D texture limit.
    TooLarge { width: u32, height: u32, max: u32 },
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureError::Decode(e) => write!(f, "image decode failed: {}", e),
            TextureError::TooLarge { width, height, max } => {
                write!(f, "image {}x{} exceeds device limit {}", width, height, max)
            }
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::Decode(e) => Some(e),
            TextureError::TooLarge { .. } => None,
        }
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        TextureError::Decode(e)
    }
}

/// Toolkit-side texture record. The toolkit owns this; the backend fills
/// in `width`/`height`/`id` on load and `failed` on decode failure.
///
/// Callers may check `failed`, or just draw: a failed texture renders the
/// placeholder, never faults.
#[derive(Clone, Debug, Default)]
pub struct TextureDesc {
    /// Image path the texture is loaded from.
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Set when decode or conversion failed; the id stays unset.
    pub failed: bool,
    /// Backend handle, present only after a successful load.
    pub id: Option<TextureId>,
}

impl TextureDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Decode an image file, canonicalize to RGBA8, and flip rows vertically
/// to match the device's bottom-left origin.
///
/// The format is sniffed from the file content with the extension as a
/// fallback, which `image::open` does internally.
pub fn decode_file(path: impl AsRef<Path>) -> Result<image::RgbaImage, TextureError> {
    Ok(image::imageops::flip_vertical(&image::open(path)?.to_rgba8()))
}

/// Decode in-memory image bytes; same canonicalization as [`decode_file`].
pub fn decode_bytes(bytes: &[u8]) -> Result<image::RgbaImage, TextureError> {
    Ok(image::imageops::flip_vertical(
        &image::load_from_memory(bytes)?.to_rgba8(),
    ))
}

/// Edge length of the missing-image placeholder texture.
pub(crate) const PLACEHOLDER_SIZE: u32 = 8;

/// Deterministic magenta/black checkerboard drawn wherever a texture
/// failed to load or was never loaded.
pub(crate) fn placeholder_pattern(size: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let texel = if (x + y) % 2 == 0 {
                [255, 0, 255, 255]
            } else {
                [0, 0, 0, 255]
            };
            data.extend_from_slice(&texel);
        }
    }
    data
}

struct Entry {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// The backend's texture store: GPU textures keyed by monotonically
/// allocated ids that are never reused.
pub struct Textures {
    entries: HashMap<TextureId, Entry>,
    next_id: u64,
}

impl Textures {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Upload raw RGBA8 texels and register them under a fresh id.
    pub fn register_rgba(
        &mut self,
        gpu: &GpuContext,
        pipeline: &Pipeline,
        data: &[u8],
        width: u32,
        height: u32,
        label: &str,
    ) -> TextureId {
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = pipeline.texture_bind_group(&gpu.device, &view);

        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                texture,
                bind_group,
                width,
                height,
            },
        );
        id
    }

    /// Load the descriptor's image file into a GPU texture.
    ///
    /// On any decode or size failure the descriptor is marked failed and
    /// its id stays unset; the error is logged, not propagated.
    pub fn load(
        &mut self,
        gpu: &GpuContext,
        pipeline: &Pipeline,
        desc: &mut TextureDesc,
        max_dimension: u32,
    ) {
        let decoded = decode_file(&desc.name).and_then(|img| {
            let (w, h) = img.dimensions();
            if w > max_dimension || h > max_dimension {
                Err(TextureError::TooLarge {
                    width: w,
                    height: h,
                    max: max_dimension,
                })
            } else {
                Ok(img)
            }
        });

        match decoded {
            Ok(img) => {
                let (w, h) = img.dimensions();
                let id = self.register_rgba(gpu, pipeline, &img, w, h, &desc.name);
                desc.width = w;
                desc.height = h;
                desc.failed = false;
                desc.id = Some(id);
            }
            Err(e) => {
                warn!("texture '{}' failed to load: {}", desc.name, e);
                desc.failed = true;
                desc.id = None;
            }
        }
    }

    /// Release the descriptor's GPU texture. No-op on a never-loaded or
    /// already-freed descriptor.
    pub fn free(&mut self, desc: &mut TextureDesc) {
        if let Some(id) = desc.id.take() {
            self.entries.remove(&id);
        }
    }

    /// Resolve a descriptor to a drawable id, substituting `placeholder`
    /// when the texture failed to load, was never loaded, or was freed.
    pub fn resolve(&self, desc: &TextureDesc, placeholder: TextureId) -> TextureId {
        match desc.id {
            Some(id) if self.entries.contains_key(&id) => id,
            _ => placeholder,
        }
    }

    pub fn bind_group(&self, id: TextureId) -> Option<&wgpu::BindGroup> {
        self.entries.get(&id).map(|e| &e.bind_group)
    }

    /// Read back one pixel's color from a loaded texture.
    ///
    /// Copies the entire image to a staging buffer, so this is strictly
    /// an initialization-time operation, never per-frame. Returns
    /// `fallback` when the texture is absent or the readback fails.
    pub fn pixel_colour(
        &self,
        gpu: &GpuContext,
        desc: &TextureDesc,
        x: u32,
        y: u32,
        fallback: Color,
    ) -> Color {
        let Some(entry) = desc.id.and_then(|id| self.entries.get(&id)) else {
            return fallback;
        };
        if x >= entry.width || y >= entry.height {
            return fallback;
        }

        // Row pitch must be aligned to COPY_BYTES_PER_ROW_ALIGNMENT.
        let unpadded = entry.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("UI Pixel Readback"),
            size: (padded * entry.height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(entry.height),
                },
            },
            wgpu::Extent3d {
                width: entry.width,
                height: entry.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = gpu.device.poll(wgpu::PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {}
            _ => return fallback,
        }

        let color = {
            let data = slice.get_mapped_range();
            let offset = (y * padded + x * 4) as usize;
            Color::rgba(
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            )
        };
        staging.unmap();
        color
    }
}

impl Default for Textures {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn png_bytes(img: &image::RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        bytes
    }

    #[test]
    fn decode_flips_rows_vertically() {
        let mut img = image::RgbaImage::new(1, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));

        let decoded = decode_bytes(&png_bytes(&img)).unwrap();
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(decoded.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        assert!(decode_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn corrupt_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"\x89PNG but not really")
            .unwrap();
        assert!(decode_file(&path).is_err());
    }

    #[test]
    fn missing_file_fails_to_decode() {
        assert!(decode_file("/nonexistent/never.png").is_err());
    }

    #[test]
    fn placeholder_pattern_is_deterministic_checker() {
        let a = placeholder_pattern(PLACEHOLDER_SIZE);
        let b = placeholder_pattern(PLACEHOLDER_SIZE);
        assert_eq!(a, b);
        assert_eq!(a.len(), (PLACEHOLDER_SIZE * PLACEHOLDER_SIZE * 4) as usize);
        // (0,0) magenta, (1,0) black.
        assert_eq!(&a[0..4], &[255, 0, 255, 255]);
        assert_eq!(&a[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn resolve_substitutes_placeholder_for_missing_textures() {
        let store = Textures::new();
        let placeholder = TextureId(99);

        let never_loaded = TextureDesc::new("untouched.png");
        assert_eq!(store.resolve(&never_loaded, placeholder), placeholder);

        let failed = TextureDesc {
            failed: true,
            ..TextureDesc::new("broken.png")
        };
        assert_eq!(store.resolve(&failed, placeholder), placeholder);

        // A stale id from a freed texture also falls back.
        let stale = TextureDesc {
            id: Some(TextureId(5)),
            ..TextureDesc::new("freed.png")
        };
        assert_eq!(store.resolve(&stale, placeholder), placeholder);
    }

    #[test]
    fn free_clears_the_id_and_double_free_is_a_noop() {
        let mut store = Textures::new();
        let mut desc = TextureDesc {
            id: Some(TextureId(7)),
            ..TextureDesc::new("tex.png")
        };

        store.free(&mut desc);
        assert_eq!(desc.id, None);

        store.free(&mut desc);
        assert_eq!(desc.id, None);
    }
}
