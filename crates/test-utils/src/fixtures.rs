//! Common test fixtures for tiling tests.
//!
//! This module provides pre-defined extents, grids and tiles that represent
//! common scenarios in raster tiling.

/// Common bounding box definitions as (west, south, east, north).
pub mod bbox {
    /// Whole world, clamped to the mercator latitude limit.
    pub const WORLD_MERCATOR: (f64, f64, f64, f64) = (-180.0, -85.051129, 180.0, 85.051129);

    /// Strictly inside tile z4/8/5, which spans lon 0..22.5, lat ~40.98..~55.78.
    pub const INSIDE_Z4_8_5: (f64, f64, f64, f64) = (2.0, 43.0, 20.0, 53.0);

    /// Straddles the z4 column boundary at lon 22.5, inside row 5.
    pub const ACROSS_Z4_COLUMNS: (f64, f64, f64, f64) = (20.0, 43.0, 25.0, 53.0);

    /// Small region in the southern Pacific, far from the others.
    pub const SOUTH_PACIFIC: (f64, f64, f64, f64) = (-150.0, -40.0, -140.0, -30.0);
}

/// Common tiles as (z, x, y).
pub mod tiles {
    pub const Z4_8_5: (u32, u32, u32) = (4, 8, 5);
    pub const Z4_9_5: (u32, u32, u32) = (4, 9, 5);
}

/// Common grid specifications for testing.
pub mod grid {
    /// 36x20 cells over [`super::bbox::INSIDE_Z4_8_5`] (0.5 degree cells).
    pub const INSIDE_Z4_8_5: GridSpec = GridSpec {
        width: 36,
        height: 20,
        min_lon: 2.0,
        max_lon: 20.0,
        min_lat: 43.0,
        max_lat: 53.0,
    };

    /// 10x20 cells across two z4 columns.
    pub const ACROSS_Z4_COLUMNS: GridSpec = GridSpec {
        width: 10,
        height: 20,
        min_lon: 20.0,
        max_lon: 25.0,
        min_lat: 43.0,
        max_lat: 53.0,
    };

    /// Simple 10x10 grid.
    pub const SIMPLE_10X10: GridSpec = GridSpec {
        width: 10,
        height: 10,
        min_lon: -10.0,
        max_lon: 10.0,
        min_lat: -10.0,
        max_lat: 10.0,
    };

    /// Geographic grid specification.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub min_lon: f64,
        pub max_lon: f64,
        pub min_lat: f64,
        pub max_lat: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.width * self.height
        }

        /// Returns the resolution in degrees as (dx, dy).
        pub fn resolution(&self) -> (f64, f64) {
            let dx = (self.max_lon - self.min_lon) / self.width as f64;
            let dy = (self.max_lat - self.min_lat) / self.height as f64;
            (dx, dy)
        }

        /// Upper-left corner, the origin of a north-up geotransform.
        pub fn origin(&self) -> (f64, f64) {
            (self.min_lon, self.max_lat)
        }

        /// Returns the bounding box as (min_lon, min_lat, max_lon, max_lat).
        pub fn bbox(&self) -> (f64, f64, f64, f64) {
            (self.min_lon, self.min_lat, self.max_lon, self.max_lat)
        }
    }
}

/// Common years for yearly file series.
pub mod years {
    pub const THREE: [u32; 3] = [2001, 2002, 2003];
}

/// Common CRS codes.
pub mod crs {
    /// WGS84 geographic
    pub const EPSG_4326: u16 = 4326;

    /// Web Mercator
    pub const EPSG_3857: u16 = 3857;
}

/// A QGIS style with three palette entries, as exported by QGIS.
pub const SAMPLE_QML: &str = r##"<!DOCTYPE qgis PUBLIC 'http://mrcc.com/qgis.dtd' 'SYSTEM'>
<qgis version="3.22.4-Białowieża">
  <pipe>
    <rasterrenderer type="paletted" band="1" opacity="1">
      <colorPalette>
        <paletteEntry value="0" color="#000000" label="none" alpha="0"/>
        <paletteEntry value="50" color="#ff0000" label="some" alpha="255"/>
        <paletteEntry value="100" color="#00ff00" label="most" alpha="255"/>
      </colorPalette>
    </rasterrenderer>
  </pipe>
</qgis>
"##;
