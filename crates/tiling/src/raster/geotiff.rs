//! GeoTIFF decoding into single-timestep raster arrays.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

use super::array::{Crs, GeoTransform, RasterArray};
use crate::error::{Result, TilingError};

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;

/// Read a GeoTIFF file into a one-timestep array.
pub fn read_geotiff(path: impl AsRef<Path>) -> Result<RasterArray> {
    let path = path.as_ref();
    let file = BufReader::new(File::open(path)?);
    let array = decode_geotiff(file)?;
    debug!(
        path = %path.display(),
        bands = array.band_count(),
        width = array.width(),
        height = array.height(),
        epsg = array.crs.epsg(),
        "Decoded GeoTIFF"
    );
    Ok(array)
}

/// Decode GeoTIFF bytes from any seekable reader.
pub fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<RasterArray> {
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024;
    let mut decoder = Decoder::new(reader)?.with_limits(limits);

    let (width, height) = decoder.dimensions()?;
    let transform = read_transform(&mut decoder)?;
    let crs = read_crs(&mut decoder)?;
    let nodata = read_nodata(&mut decoder);

    let samples = decode_samples(decoder.read_image()?);
    let pixels = width as usize * height as usize;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(TilingError::invalid_raster(format!(
            "{} samples do not divide into {}x{} pixels",
            samples.len(),
            width,
            height
        )));
    }
    let bands = samples.len() / pixels;

    // Chunky (interleaved) samples to band-major planes
    let data = if bands == 1 {
        samples
    } else {
        let mut planar = vec![0.0f32; samples.len()];
        for (i, pixel) in samples.chunks_exact(bands).enumerate() {
            for (band, value) in pixel.iter().enumerate() {
                planar[band * pixels + i] = *value;
            }
        }
        planar
    };

    Ok(RasterArray::new(
        (1, bands, height as usize, width as usize),
        data,
        transform,
        crs,
    )?
    .with_nodata(nodata))
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

    match (tiepoint, scale) {
        (Ok(tiepoint), Ok(scale)) if tiepoint.len() >= 6 && scale.len() >= 2 => {
            // Tiepoint is [i, j, k, x, y, z]: raster (i, j) sits at world (x, y)
            let (i, j) = (tiepoint[0], tiepoint[1]);
            let origin_x = tiepoint[3] - i * scale[0];
            let origin_y = tiepoint[4] + j * scale[1];
            Ok(GeoTransform::new(origin_x, origin_y, scale[0], scale[1]))
        }
        _ => Err(TilingError::invalid_raster(
            "missing ModelTiepoint/ModelPixelScale georeferencing",
        )),
    }
}

/// EPSG:3857 when the key directory says so, otherwise geographic.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Crs> {
    let keys = match decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag) {
        Ok(keys) => keys,
        Err(_) => return Ok(Crs::Geographic),
    };

    let mut model_type = None;
    let mut code = None;
    // Header is 4 shorts, then 4 shorts per key
    for entry in keys.get(4..).unwrap_or_default().chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key {
            GT_MODEL_TYPE_GEO_KEY => model_type = Some(value),
            PROJECTED_CS_TYPE_GEO_KEY | GEOGRAPHIC_TYPE_GEO_KEY => code = Some(value),
            _ => {}
        }
    }

    match (model_type, code) {
        (_, Some(code)) => Crs::from_epsg(code).ok_or_else(|| {
            TilingError::invalid_raster(format!("unsupported CRS EPSG:{}", code))
        }),
        (Some(MODEL_TYPE_PROJECTED), None) => Err(TilingError::invalid_raster(
            "projected GeoTIFF without a CRS code",
        )),
        _ => Ok(Crs::Geographic),
    }
}

/// GDAL_NODATA is stored as an ASCII string.
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse().ok())
}

fn decode_samples(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::{crs, grid};
    use test_utils::{assert_approx_eq, create_ramp_grid, interleave_bands, write_geotiff, GeoTiffFixture};
    use tiff::encoder::{colortype::Gray32Float, TiffEncoder};
    use tile_common::MERCATOR_EXTENT;

    #[test]
    fn test_geographic_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.tif");
        let spec = grid::SIMPLE_10X10;
        let data = create_ramp_grid(spec.width, spec.height, 0.0, 90.0);
        write_geotiff(&path, &GeoTiffFixture::single_band(spec, data.clone())).unwrap();

        let array = read_geotiff(&path).unwrap();
        assert_eq!(array.shape(), (1, 1, 10, 10));
        assert_eq!(array.crs, Crs::Geographic);
        assert_eq!(array.transform, GeoTransform::new(-10.0, 10.0, 2.0, 2.0));
        assert_eq!(array.nodata, None);
        assert_eq!(array.plane(0, 0), &data[..]);
        assert_eq!(array.value(0, 0, 3, 9), 90.0);
    }

    #[test]
    fn test_web_mercator_detected_from_geokeys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world_3857.tif");
        let fixture = GeoTiffFixture {
            width: 4,
            height: 4,
            bands: 1,
            data: (0..16).map(|v| v as f32).collect(),
            origin: (-MERCATOR_EXTENT, MERCATOR_EXTENT),
            pixel_size: (MERCATOR_EXTENT / 2.0, MERCATOR_EXTENT / 2.0),
            epsg: 4326,
            nodata: None,
        }
        .with_epsg(crs::EPSG_3857);
        write_geotiff(&path, &fixture).unwrap();

        let array = read_geotiff(&path).unwrap();
        assert_eq!(array.crs, Crs::WebMercator);
        assert_eq!(array.crs.epsg(), 3857);
        let bounds = array.bounds();
        assert_approx_eq!(bounds.min_x, -180.0, 1e-6);
        assert_approx_eq!(bounds.max_x, 180.0, 1e-6);
        assert_approx_eq!(bounds.max_y, 85.0511, 1e-3);
        assert_approx_eq!(bounds.min_y, -85.0511, 1e-3);
    }

    #[test]
    fn test_nodata_tag_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holes.tif");
        let spec = grid::SIMPLE_10X10;
        let mut data = vec![5.0; spec.size()];
        data[0] = -9999.0;
        let fixture = GeoTiffFixture::single_band(spec, data).with_nodata(-9999.0);
        write_geotiff(&path, &fixture).unwrap();

        let array = read_geotiff(&path).unwrap();
        assert_eq!(array.nodata, Some(-9999.0));
        assert!(!array.is_valid(array.value(0, 0, 0, 0)));
        assert!(array.is_valid(array.value(0, 0, 0, 1)));
    }

    #[test]
    fn test_chunky_bands_split_into_planes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let spec = grid::SIMPLE_10X10;
        let planes = vec![
            vec![1.0; spec.size()],
            vec![2.0; spec.size()],
            vec![3.0; spec.size()],
        ];
        let fixture = GeoTiffFixture::single_band(spec, Vec::new()).with_bands(3, interleave_bands(&planes));
        write_geotiff(&path, &fixture).unwrap();

        let array = read_geotiff(&path).unwrap();
        assert_eq!(array.band_count(), 3);
        assert!(array.plane(0, 1).iter().all(|v| *v == 2.0));
        assert!(array.plane(0, 2).iter().all(|v| *v == 3.0));
    }

    #[test]
    fn test_missing_georeferencing_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.tif");
        let file = File::create(&path).unwrap();
        TiffEncoder::new(file)
            .unwrap()
            .write_image::<Gray32Float>(2, 2, &[0.0; 4])
            .unwrap();

        assert!(matches!(read_geotiff(&path), Err(TilingError::InvalidRaster(_))));
    }
}
