//! Global constants for the annotation engine

/// View zoom limits
pub mod zoom {
    /// Smallest allowed view scale
    pub const MIN: f64 = 0.1;
    /// Largest allowed view scale
    pub const MAX: f64 = 10.0;
    /// Wheel zoom factor when scrolling toward the user (positive delta)
    pub const WHEEL_OUT: f64 = 0.9;
    /// Wheel zoom factor when scrolling away from the user
    pub const WHEEL_IN: f64 = 1.1;
    /// Toolbar zoom-in factor
    pub const BUTTON_IN: f64 = 1.2;
    /// Toolbar zoom-out factor
    pub const BUTTON_OUT: f64 = 0.8;
}

/// Hit-testing thresholds in image pixels
pub mod threshold {
    /// A polygon click closer than this to the first vertex closes the ring
    pub const POLYGON_CLOSE: f64 = 10.0;
    /// A delete click closer than this to a point annotation removes it
    pub const POINT_DELETE: f64 = 15.0;
}

/// Render style defaults in viewport pixels
pub mod style {
    pub const POINT_RADIUS: f32 = 6.0;
    pub const POINT_OUTLINE_WIDTH: f32 = 1.0;
    pub const OUTLINE_WIDTH: f32 = 2.0;
    pub const VERTEX_RADIUS: f32 = 4.0;
    /// Alpha of polygon fills (0x40 of 0xff)
    pub const FILL_ALPHA: u8 = 0x40;
    /// Surface color behind the letterboxed image
    pub const BACKGROUND: [u8; 4] = [0xf9, 0xfa, 0xfb, 0xff];
}

/// Placeholder gradient used when an image cannot be fetched
pub mod placeholder {
    pub const START: [u8; 3] = [0xf3, 0xe8, 0xff];
    pub const END: [u8; 3] = [0xdb, 0xea, 0xfe];
}

/// Default viewport size for the CLI renderer
pub const DEFAULT_VIEWPORT: (u32, u32) = (1024, 768);
