//! Static format-support capability table (`spec.md` §4.6): the driver
//! answers `CheckFormatSupport`-style queries from this fixed table. The
//! host backend is authoritative and validates at resource-creation time;
//! this table only satisfies the runtime's capability enumeration with
//! generous D3D11 feature-level 11.0 values.

use bitflags::bitflags;
use pvgpu_protocol::resource::DxgiFormat;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatSupport: u32 {
        const SHADER_SAMPLE = 1 << 0;
        const RENDER_TARGET = 1 << 1;
        const BLENDABLE     = 1 << 2;
        const MSAA_RT       = 1 << 3;
        const MSAA_LOAD     = 1 << 4;
        const DEPTH_STENCIL = 1 << 5;
    }
}

const FULL_COLOR: FormatSupport = FormatSupport::SHADER_SAMPLE
    .union(FormatSupport::RENDER_TARGET)
    .union(FormatSupport::BLENDABLE)
    .union(FormatSupport::MSAA_RT)
    .union(FormatSupport::MSAA_LOAD);

const SAMPLE_ONLY: FormatSupport = FormatSupport::SHADER_SAMPLE;

const DEPTH: FormatSupport = FormatSupport::DEPTH_STENCIL
    .union(FormatSupport::SHADER_SAMPLE)
    .union(FormatSupport::MSAA_RT);

/// One row per format this driver recognizes (`pvgpu_protocol::resource::DxgiFormat`).
const FORMAT_CAPS: &[(DxgiFormat, FormatSupport)] = &[
    (DxgiFormat::R8g8b8a8Unorm, FULL_COLOR),
    (DxgiFormat::R8g8b8a8UnormSrgb, FULL_COLOR),
    (DxgiFormat::B8g8r8a8Unorm, FULL_COLOR),
    (DxgiFormat::B8g8r8a8UnormSrgb, FULL_COLOR),
    (DxgiFormat::R16g16b16a16Float, FULL_COLOR),
    (DxgiFormat::R16g16b16a16Unorm, FULL_COLOR),
    (DxgiFormat::R32g32b32a32Float, FULL_COLOR),
    (DxgiFormat::R32g32b32Float, SAMPLE_ONLY),
    (DxgiFormat::R32g32Float, SAMPLE_ONLY),
    (DxgiFormat::R16g16Float, SAMPLE_ONLY),
    (DxgiFormat::R32Float, FormatSupport::SHADER_SAMPLE.union(FormatSupport::RENDER_TARGET)),
    (DxgiFormat::R16Float, FormatSupport::SHADER_SAMPLE.union(FormatSupport::RENDER_TARGET)),
    (DxgiFormat::R32Uint, SAMPLE_ONLY),
    (DxgiFormat::R16Uint, SAMPLE_ONLY),
    (DxgiFormat::R8Uint, SAMPLE_ONLY),
    (DxgiFormat::D32Float, DEPTH),
    (DxgiFormat::D24UnormS8Uint, DEPTH),
    (DxgiFormat::D16Unorm, DEPTH),
    (DxgiFormat::Bc1Unorm, SAMPLE_ONLY),
    (DxgiFormat::Bc3Unorm, SAMPLE_ONLY),
    (DxgiFormat::Bc7Unorm, SAMPLE_ONLY),
];

/// Looks up `format`'s support class, or `FormatSupport::empty()` for
/// anything this table doesn't name (`Unknown`, or a future format the guest
/// queries before the driver recognizes it).
pub fn format_support(format: DxgiFormat) -> FormatSupport {
    FORMAT_CAPS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, support)| *support)
        .unwrap_or(FormatSupport::empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_render_target_format_supports_blend_and_msaa() {
        let support = format_support(DxgiFormat::B8g8r8a8Unorm);
        assert!(support.contains(FormatSupport::RENDER_TARGET));
        assert!(support.contains(FormatSupport::BLENDABLE));
        assert!(support.contains(FormatSupport::MSAA_RT));
    }

    #[test]
    fn depth_format_is_not_blendable() {
        let support = format_support(DxgiFormat::D32Float);
        assert!(support.contains(FormatSupport::DEPTH_STENCIL));
        assert!(!support.contains(FormatSupport::BLENDABLE));
    }

    #[test]
    fn unrecognized_format_reports_no_support() {
        assert_eq!(format_support(DxgiFormat::Unknown), FormatSupport::empty());
    }
}
