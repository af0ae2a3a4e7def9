//! The miniport's local shadow of the negotiated display mode (`spec.md`
//! §4.4 `SET_DISPLAY_MODE`), kept in sync with `ControlRegion`'s
//! `display_*` fields.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayShadow {
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
    pub format: u32,
}
