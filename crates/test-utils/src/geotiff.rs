//! Writes small GeoTIFF fixtures to disk.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tiff::encoder::colortype::{Gray32Float, RGB32Float, RGBA32Float};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::TiffError;

use crate::fixtures::grid::GridSpec;

/// Contents of a single-image float GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffFixture {
    pub width: u32,
    pub height: u32,
    /// 1, 3 or 4.
    pub bands: usize,
    /// Chunky samples, `width * height * bands` long.
    pub data: Vec<f32>,
    /// World coordinate of the upper-left corner.
    pub origin: (f64, f64),
    pub pixel_size: (f64, f64),
    pub epsg: u16,
    pub nodata: Option<f64>,
}

impl GeoTiffFixture {
    /// Single-band geographic fixture over `grid`.
    pub fn single_band(grid: GridSpec, data: Vec<f32>) -> Self {
        Self {
            width: grid.width as u32,
            height: grid.height as u32,
            bands: 1,
            data,
            origin: grid.origin(),
            pixel_size: grid.resolution(),
            epsg: 4326,
            nodata: None,
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_bands(mut self, bands: usize, data: Vec<f32>) -> Self {
        self.bands = bands;
        self.data = data;
        self
    }

    pub fn with_epsg(mut self, epsg: u16) -> Self {
        self.epsg = epsg;
        self
    }
}

/// Write `fixture` to `path` as an uncompressed GeoTIFF.
pub fn write_geotiff(path: impl AsRef<Path>, fixture: &GeoTiffFixture) -> Result<(), TiffError> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder = TiffEncoder::new(file)?;
    let (w, h) = (fixture.width, fixture.height);

    match fixture.bands {
        1 => {
            let mut image = encoder.new_image::<Gray32Float>(w, h)?;
            write_geo_tags(image.encoder(), fixture)?;
            image.write_data(&fixture.data)?;
        }
        3 => {
            let mut image = encoder.new_image::<RGB32Float>(w, h)?;
            write_geo_tags(image.encoder(), fixture)?;
            image.write_data(&fixture.data)?;
        }
        4 => {
            let mut image = encoder.new_image::<RGBA32Float>(w, h)?;
            write_geo_tags(image.encoder(), fixture)?;
            image.write_data(&fixture.data)?;
        }
        n => {
            return Err(TiffError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("fixtures support 1, 3 or 4 bands, got {}", n),
            )))
        }
    }
    Ok(())
}

fn write_geo_tags<W: std::io::Write + std::io::Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    fixture: &GeoTiffFixture,
) -> Result<(), TiffError> {
    let scale = [fixture.pixel_size.0, fixture.pixel_size.1, 0.0];
    dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, fixture.origin.0, fixture.origin.1, 0.0];
    dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    let geokeys = geokey_directory(fixture.epsg);
    dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    if let Some(nodata) = fixture.nodata {
        dir.write_tag(Tag::GdalNodata, nodata.to_string().as_str())?;
    }
    Ok(())
}

/// Header plus GTModelType, GTRasterType and the CRS key.
fn geokey_directory(epsg: u16) -> Vec<u16> {
    let geographic = epsg == 4326;
    let (model_type, crs_key) = if geographic { (2, 2048) } else { (1, 3072) };
    vec![
        1, 1, 0, 3, // version, revision, minor, key count
        1024, 0, 1, model_type, // GTModelTypeGeoKey
        1025, 0, 1, 1, // GTRasterTypeGeoKey: PixelIsArea
        crs_key, 0, 1, epsg,
    ]
}

/// Write one single-band file per year into `dir`, named `<prefix>_<year>.tif`.
///
/// Year `n` in `years` gets a constant grid of `values[n]`.
pub fn write_yearly_series(
    dir: impl AsRef<Path>,
    prefix: &str,
    grid: GridSpec,
    years: &[u32],
    values: &[f32],
) -> Result<Vec<PathBuf>, TiffError> {
    let mut paths = Vec::with_capacity(years.len());
    for (year, value) in years.iter().zip(values) {
        let path = dir.as_ref().join(format!("{}_{}.tif", prefix, year));
        let fixture = GeoTiffFixture::single_band(grid, vec![*value; grid.size()]);
        write_geotiff(&path, &fixture)?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::grid;
    use tiff::decoder::Decoder;

    #[test]
    fn test_written_tags_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.tif");
        let fixture = GeoTiffFixture::single_band(grid::SIMPLE_10X10, vec![1.5; 100]).with_nodata(-9999.0);
        write_geotiff(&path, &fixture).unwrap();

        let mut decoder = Decoder::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (10, 10));
        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap();
        assert_eq!(&scale[..2], &[2.0, 2.0]);
        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap();
        assert_eq!(&tiepoint[3..5], &[-10.0, 10.0]);
        let nodata = decoder.get_tag_ascii_string(Tag::GdalNodata).unwrap();
        assert_eq!(nodata.trim_end_matches('\0'), "-9999");
    }

    #[test]
    fn test_write_yearly_series() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_yearly_series(dir.path(), "ndvi", grid::SIMPLE_10X10, &[2001, 2002], &[1.0, 2.0]).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("ndvi_2002.tif"));
        assert!(paths.iter().all(|p| p.exists()));
    }
}
