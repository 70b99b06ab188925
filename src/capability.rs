//! GPU capability table built once at startup.
//!
//! Historically this backend resolved device entry points one by one at
//! init; under wgpu the same concern becomes a capability table populated
//! from the adapter. Absent capabilities are explicit [`Support::Unavailable`]
//! sentinels instead of null pointers: querying one is cheap, *relying* on
//! one is a caller error that [`GpuCapabilities::expect`] makes loud in
//! debug builds.

use log::debug;

/// Availability of one optional device capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Support {
    Available,
    Unavailable,
}

impl Support {
    pub fn is_available(self) -> bool {
        self == Support::Available
    }
}

/// Optional device capabilities this backend can take advantage of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuCapability {
    /// Anisotropic sampler filtering (downlevel flag).
    AnisotropicFiltering,
    /// Full 32-bit index range for draws (downlevel flag).
    FullDrawIndexRange,
    /// Float32 textures usable with linear filtering.
    Float32Filterable,
}

const CAPABILITY_COUNT: usize = 3;

/// Capability and limit table, populated once from the adapter.
#[derive(Clone, Debug)]
pub struct GpuCapabilities {
    table: [Support; CAPABILITY_COUNT],
    max_texture_dimension_2d: u32,
    max_buffer_size: u64,
}

impl GpuCapabilities {
    /// Build the table from a live adapter.
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        let features = adapter.features();
        let limits = adapter.limits();
        let downlevel = adapter.get_downlevel_capabilities();
        Self::from_raw(features, &limits, downlevel.flags)
    }

    /// Build the table from raw feature/limit values. Lets the lookup
    /// logic be exercised without a device.
    pub fn from_raw(
        features: wgpu::Features,
        limits: &wgpu::Limits,
        downlevel: wgpu::DownlevelFlags,
    ) -> Self {
        let mut table = [Support::Unavailable; CAPABILITY_COUNT];

        if downlevel.contains(wgpu::DownlevelFlags::ANISOTROPIC_FILTERING) {
            table[GpuCapability::AnisotropicFiltering as usize] = Support::Available;
        }
        if downlevel.contains(wgpu::DownlevelFlags::FULL_DRAW_INDEX_UINT32) {
            table[GpuCapability::FullDrawIndexRange as usize] = Support::Available;
        }
        if features.contains(wgpu::Features::FLOAT32_FILTERABLE) {
            table[GpuCapability::Float32Filterable as usize] = Support::Available;
        }

        let caps = Self {
            table,
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
            max_buffer_size: limits.max_buffer_size,
        };
        debug!("gpu capability table: {:?}", caps);
        caps
    }

    pub fn supports(&self, cap: GpuCapability) -> Support {
        self.table[cap as usize]
    }

    /// Assert a capability is present before depending on it.
    ///
    /// Debug builds panic on an unavailable capability; release builds
    /// return the sentinel and leave degradation to the caller.
    pub fn expect(&self, cap: GpuCapability) -> Support {
        let support = self.supports(cap);
        debug_assert!(
            support.is_available(),
            "required gpu capability {:?} is unavailable",
            cap
        );
        support
    }

    /// Largest supported square 2D texture edge, in texels.
    pub fn max_texture_dimension_2d(&self) -> u32 {
        self.max_texture_dimension_2d
    }

    /// Largest supported buffer allocation, in bytes.
    pub fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_flags_leave_every_entry_unavailable() {
        let caps = GpuCapabilities::from_raw(
            wgpu::Features::empty(),
            &wgpu::Limits::downlevel_defaults(),
            wgpu::DownlevelFlags::empty(),
        );
        assert_eq!(
            caps.supports(GpuCapability::AnisotropicFiltering),
            Support::Unavailable
        );
        assert_eq!(
            caps.supports(GpuCapability::FullDrawIndexRange),
            Support::Unavailable
        );
        assert_eq!(
            caps.supports(GpuCapability::Float32Filterable),
            Support::Unavailable
        );
    }

    #[test]
    fn downlevel_flags_populate_their_entries() {
        let caps = GpuCapabilities::from_raw(
            wgpu::Features::empty(),
            &wgpu::Limits::downlevel_defaults(),
            wgpu::DownlevelFlags::ANISOTROPIC_FILTERING,
        );
        assert!(
            caps.supports(GpuCapability::AnisotropicFiltering)
                .is_available()
        );
        assert!(
            !caps
                .supports(GpuCapability::FullDrawIndexRange)
                .is_available()
        );
    }

    #[test]
    fn limits_are_carried_through() {
        let limits = wgpu::Limits {
            max_texture_dimension_2d: 4096,
            ..wgpu::Limits::downlevel_defaults()
        };
        let caps =
            GpuCapabilities::from_raw(wgpu::Features::empty(), &limits, wgpu::DownlevelFlags::empty());
        assert_eq!(caps.max_texture_dimension_2d(), 4096);
    }
}
