//! Guest-side resource bookkeeping: just enough of each `CreateResource`
//! call's parameters to compute a `Map` size and pitch later, since the
//! wire command itself is fire-and-forget (`spec.md` §4.5 Map/Unmap).

use pvgpu_protocol::resource::{row_pitch, DxgiFormat, ResourceType};

#[derive(Debug, Clone, Copy)]
pub struct ResourceRecord {
    pub resource_type: ResourceType,
    pub format: DxgiFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub byte_width: u32,
}

/// Map size and pitches for a resource, per `spec.md` §4.5 Map step 1: a
/// buffer's map size is its `byte_width`; a texture's is
/// `row_pitch * height * depth`, using the format's real texel layout
/// rather than a flat `width * 4` guess (`spec.md` §9).
#[derive(Debug, Clone, Copy)]
pub struct MapLayout {
    pub size: u32,
    pub row_pitch: u32,
    pub depth_pitch: u32,
}

impl ResourceRecord {
    pub fn map_layout(&self) -> MapLayout {
        if self.resource_type == ResourceType::Buffer {
            return MapLayout {
                size: self.byte_width,
                row_pitch: 0,
                depth_pitch: 0,
            };
        }
        let pitch = row_pitch(self.format, self.width);
        let depth_pitch = pitch * self.height.max(1);
        MapLayout {
            size: depth_pitch * self.depth.max(1),
            row_pitch: pitch,
            depth_pitch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_map_size_is_byte_width() {
        let r = ResourceRecord {
            resource_type: ResourceType::Buffer,
            format: DxgiFormat::Unknown,
            width: 0,
            height: 0,
            depth: 0,
            byte_width: 4096,
        };
        assert_eq!(r.map_layout().size, 4096);
    }

    #[test]
    fn texture_map_size_uses_real_bpp() {
        let r = ResourceRecord {
            resource_type: ResourceType::Texture2d,
            format: DxgiFormat::B8g8r8a8Unorm,
            width: 256,
            height: 128,
            depth: 1,
            byte_width: 0,
        };
        let layout = r.map_layout();
        assert_eq!(layout.row_pitch, 1024);
        assert_eq!(layout.depth_pitch, 1024 * 128);
        assert_eq!(layout.size, 1024 * 128);
    }
}
