//! Stacking scene assets into a time-ordered raster cube.
//!
//! Each requested asset becomes one band. GeoTIFFs carrying a pixel scale and
//! tie point are windowed onto the requested bounds; rasters without a
//! georeference are taken as already aligned to the output grid and only
//! resampled when their size differs. Scenes that share an acquisition time
//! are mosaicked, earlier records filling a pixel first.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, instrument};

use crate::error::{CatalogError, Result};
use crate::stac::SceneRecord;
use compositor::{RasterCube, NODATA};
use videomap_common::BoundingBox;

/// Resampling method used when a raster does not match the output grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    Nearest,
    #[default]
    Bilinear,
}

impl std::str::FromStr for Resampling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(format!("unknown resampling method '{}'", other)),
        }
    }
}

/// Placement of a north-up raster in model space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// Model coordinate of the outer top-left corner of pixel (0, 0).
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Model extent of a `width x height` raster.
    pub fn extent(&self, width: usize, height: usize) -> BoundingBox {
        BoundingBox::new(
            self.origin_x,
            self.origin_y - height as f64 * self.pixel_height,
            self.origin_x + width as f64 * self.pixel_width,
            self.origin_y,
        )
    }

    /// Fractional (col, row) of a model coordinate, pixel centres at integers.
    fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width - 0.5,
            (self.origin_y - y) / self.pixel_height - 0.5,
        )
    }
}

/// One decoded single-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBand {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
    pub transform: Option<GeoTransform>,
    /// CRS from the GeoKey directory, when present.
    pub epsg: Option<u32>,
}

/// What to stack and on which grid.
#[derive(Debug, Clone, PartialEq)]
pub struct StackRequest {
    /// Output extent in the units of `epsg`.
    pub bounds: BoundingBox,
    pub epsg: u32,
    /// Asset names, in band order.
    pub assets: Vec<String>,
    pub width: usize,
    pub height: usize,
    pub resampling: Resampling,
}

/// Loads scene assets into a cube. Implementations block.
pub trait RasterStacker: Send + Sync {
    fn stack(&self, scenes: &[SceneRecord], request: &StackRequest) -> Result<RasterCube>;
}

/// Stacker for single-band GeoTIFF assets on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct TiffStacker {
    /// Mirror directory for remote hrefs, laid out as `<root>/<host>/<path>`.
    asset_root: Option<PathBuf>,
}

impl TiffStacker {
    pub fn new(asset_root: Option<PathBuf>) -> Self {
        Self { asset_root }
    }

    /// Map an asset href to a local path.
    pub fn resolve(&self, href: &str) -> Result<PathBuf> {
        if let Some(path) = href.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }

        let remote = href
            .strip_prefix("https://")
            .or_else(|| href.strip_prefix("http://"));
        if let Some(rest) = remote {
            let root = self
                .asset_root
                .as_ref()
                .ok_or_else(|| CatalogError::UnresolvableAsset(href.to_string()))?;
            let rest = rest.split(['?', '#']).next().unwrap_or(rest);
            return Ok(root.join(rest));
        }

        let path = PathBuf::from(href);
        match &self.asset_root {
            Some(root) if path.is_relative() => Ok(root.join(path)),
            _ => Ok(path),
        }
    }

    fn load_plane(&self, scene: &SceneRecord, asset: &str, request: &StackRequest) -> Result<Vec<u16>> {
        let path = self.resolve(scene.asset(asset)?)?;
        let band = read_band(&path)?;

        let Some(transform) = band.transform else {
            return Ok(align_unreferenced(&band, scene, asset, request));
        };

        if let Some(found) = band.epsg.or(scene.epsg).filter(|&e| e != request.epsg) {
            return Err(CatalogError::CrsMismatch {
                path,
                found,
                expected: request.epsg,
            });
        }

        if !transform
            .extent(band.width, band.height)
            .intersects(&request.bounds)
        {
            debug!(scene = %scene.id, asset, "Asset does not overlap the output grid");
            return Ok(vec![NODATA; request.width * request.height]);
        }

        Ok(warp(&band, &transform, request))
    }
}

/// Fit a raster without georeference onto the output grid by size alone.
fn align_unreferenced(
    band: &RasterBand,
    scene: &SceneRecord,
    asset: &str,
    request: &StackRequest,
) -> Vec<u16> {
    if band.width == request.width && band.height == request.height {
        return band.data.clone();
    }

    debug!(
        scene = %scene.id,
        asset,
        src_width = band.width,
        src_height = band.height,
        "Resampling unreferenced asset to output grid"
    );
    resample(
        &band.data,
        band.width,
        band.height,
        request.width,
        request.height,
        request.resampling,
    )
}

impl RasterStacker for TiffStacker {
    #[instrument(
        skip(self, scenes, request),
        fields(scenes = scenes.len(), bands = request.assets.len(), epsg = request.epsg)
    )]
    fn stack(&self, scenes: &[SceneRecord], request: &StackRequest) -> Result<RasterCube> {
        if request.width == 0 || request.height == 0 {
            return Err(CatalogError::config("stack grid must not be empty"));
        }

        let mut groups: BTreeMap<DateTime<Utc>, Vec<&SceneRecord>> = BTreeMap::new();
        for scene in scenes {
            groups.entry(scene.datetime).or_default().push(scene);
        }

        let plane_len = request.width * request.height;
        let mut data = Vec::with_capacity(groups.len() * request.assets.len() * plane_len);

        for (datetime, group) in &groups {
            for asset in &request.assets {
                let mut plane = vec![NODATA; plane_len];
                for scene in group {
                    let layer = self.load_plane(scene, asset, request)?;
                    for (out, v) in plane.iter_mut().zip(layer) {
                        if *out == NODATA {
                            *out = v;
                        }
                    }
                }
                data.extend(plane);
            }
            if group.len() > 1 {
                debug!(%datetime, scenes = group.len(), "Mosaicked scenes");
            }
        }

        let cube = RasterCube::new(
            groups.keys().copied().collect(),
            request.assets.clone(),
            request.height,
            request.width,
            data,
        )?;

        debug!(
            times = cube.shape().times,
            bounds = ?request.bounds.to_array(),
            "Stacked cube"
        );
        Ok(cube)
    }
}

const GEOGRAPHIC_TYPE_GEO_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u32 = 3072;
const USER_DEFINED: u32 = 32767;

/// Decode a single-band 8 or 16 bit (Geo)TIFF.
pub fn read_band(path: &Path) -> Result<RasterBand> {
    let file = File::open(path).map_err(|e| CatalogError::io(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| CatalogError::decode(path, e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| CatalogError::decode(path, e))?;

    match decoder.colortype().map_err(|e| CatalogError::decode(path, e))? {
        ColorType::Gray(8) | ColorType::Gray(16) => {}
        other => {
            return Err(CatalogError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: format!("{:?}", other),
            })
        }
    }

    let transform = read_transform(&mut decoder, path)?;
    let epsg = read_epsg(&mut decoder, path)?;

    let data = match decoder
        .read_image()
        .map_err(|e| CatalogError::decode(path, e))?
    {
        DecodingResult::U8(v) => v.into_iter().map(u16::from).collect(),
        DecodingResult::U16(v) => v,
        _ => {
            return Err(CatalogError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: "non-integer samples".to_string(),
            })
        }
    };

    Ok(RasterBand {
        width: width as usize,
        height: height as usize,
        data,
        transform,
        epsg,
    })
}

fn read_f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag, path: &Path) -> Result<Option<Vec<f64>>> {
    decoder
        .find_tag(tag)
        .map_err(|e| CatalogError::decode(path, e))?
        .map(|value| value.into_f64_vec().map_err(|e| CatalogError::decode(path, e)))
        .transpose()
}

/// North-up transform from the pixel scale and the first tie point.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Option<GeoTransform>> {
    let Some(scale) = read_f64_tag(decoder, Tag::ModelPixelScaleTag, path)? else {
        return Ok(None);
    };
    let Some(tie) = read_f64_tag(decoder, Tag::ModelTiepointTag, path)? else {
        return Ok(None);
    };

    if scale.len() < 2 || tie.len() < 6 || scale[0] <= 0.0 || scale[1] <= 0.0 {
        return Err(CatalogError::decode(path, "malformed pixel scale or tie point"));
    }

    let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
    Ok(Some(GeoTransform {
        origin_x: x - i * scale[0],
        origin_y: y + j * scale[1],
        pixel_width: scale[0],
        pixel_height: scale[1],
    }))
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Option<u32>> {
    let Some(value) = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(|e| CatalogError::decode(path, e))?
    else {
        return Ok(None);
    };
    let keys = value
        .into_u32_vec()
        .map_err(|e| CatalogError::decode(path, e))?;
    Ok(epsg_from_geokeys(&keys))
}

/// CRS code from a GeoKey directory, projected before geographic.
///
/// The directory is a 4-value header followed by
/// `(key, location, count, value)` entries; only inline values count.
fn epsg_from_geokeys(keys: &[u32]) -> Option<u32> {
    let entries = keys.get(4..)?;
    let lookup = |wanted: u32| {
        entries
            .chunks_exact(4)
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3])
    };
    lookup(PROJECTED_CS_TYPE_GEO_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY))
        .filter(|&code| code != 0 && code != USER_DEFINED)
}

/// Sample a georeferenced raster at the centre of every output pixel.
///
/// Output pixels whose centre falls outside the raster are NoData.
pub fn warp(band: &RasterBand, transform: &GeoTransform, request: &StackRequest) -> Vec<u16> {
    let bounds = &request.bounds;
    let dx = bounds.width() / request.width as f64;
    let dy = bounds.height() / request.height as f64;
    let mut out = Vec::with_capacity(request.width * request.height);

    for row in 0..request.height {
        let y = bounds.max_y - (row as f64 + 0.5) * dy;
        for col in 0..request.width {
            let x = bounds.min_x + (col as f64 + 0.5) * dx;
            let (fx, fy) = transform.to_pixel(x, y);
            out.push(sample(
                &band.data,
                band.width,
                band.height,
                fx,
                fy,
                request.resampling,
            ));
        }
    }
    out
}

fn sample(data: &[u16], width: usize, height: usize, x: f64, y: f64, method: Resampling) -> u16 {
    if width == 0
        || height == 0
        || x < -0.5
        || y < -0.5
        || x >= width as f64 - 0.5
        || y >= height as f64 - 0.5
    {
        return NODATA;
    }
    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);
    match method {
        Resampling::Nearest => nearest_interpolate(data, width, height, x, y),
        Resampling::Bilinear => bilinear_interpolate(data, width, height, x, y),
    }
}

/// Resample a row-major grid to a new size, aligning pixel centres.
pub fn resample(
    data: &[u16],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
    method: Resampling,
) -> Vec<u16> {
    if src_width == 0 || src_height == 0 {
        return vec![NODATA; dst_width * dst_height];
    }

    let sx = src_width as f64 / dst_width as f64;
    let sy = src_height as f64 / dst_height as f64;
    let mut out = Vec::with_capacity(dst_width * dst_height);

    for row in 0..dst_height {
        let y = ((row as f64 + 0.5) * sy - 0.5).clamp(0.0, (src_height - 1) as f64);
        for col in 0..dst_width {
            let x = ((col as f64 + 0.5) * sx - 0.5).clamp(0.0, (src_width - 1) as f64);
            out.push(match method {
                Resampling::Nearest => nearest_interpolate(data, src_width, src_height, x, y),
                Resampling::Bilinear => bilinear_interpolate(data, src_width, src_height, x, y),
            });
        }
    }
    out
}

fn nearest_interpolate(data: &[u16], width: usize, height: usize, x: f64, y: f64) -> u16 {
    let col = x.round() as usize;
    let row = y.round() as usize;

    if col >= width || row >= height {
        return NODATA;
    }

    data[row * width + col]
}

/// NoData if any of the four corners is NoData.
fn bilinear_interpolate(data: &[u16], width: usize, height: usize, x: f64, y: f64) -> u16 {
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;

    if x0 >= width || y0 >= height {
        return NODATA;
    }

    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if [v00, v10, v01, v11].contains(&NODATA) {
        return NODATA;
    }

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let top = v00 as f64 * (1.0 - xf) + v10 as f64 * xf;
    let bottom = v01 as f64 * (1.0 - xf) + v11 as f64 * xf;
    (top * (1.0 - yf) + bottom * yf)
        .round()
        .clamp(0.0, u16::MAX as f64) as u16
}
