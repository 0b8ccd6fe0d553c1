//! Tests for stacking GeoTIFF assets into raster cubes.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use scene_catalog::{
    read_band, CatalogError, RasterStacker, Resampling, SceneRecord, StackRequest, TiffStacker,
};
use test_utils::{day, temp_output_dir};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use videomap_common::BoundingBox;

fn write_gray16(path: &Path, width: u32, height: u32, data: &[u16]) {
    let mut file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(&mut file).unwrap();
    encoder
        .write_image::<colortype::Gray16>(width, height, data)
        .unwrap();
}

fn write_gray8(path: &Path, width: u32, height: u32, data: &[u8]) {
    let mut file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(&mut file).unwrap();
    encoder
        .write_image::<colortype::Gray8>(width, height, data)
        .unwrap();
}

/// North-up raster with 1 unit pixels whose top-left corner sits at `origin`.
fn write_georeferenced(
    path: &Path,
    width: u32,
    height: u32,
    data: &[u16],
    origin: (f64, f64),
    epsg: Option<u16>,
) {
    let mut file = File::create(path).unwrap();
    let mut tiff = TiffEncoder::new(&mut file).unwrap();
    let mut image = tiff.new_image::<colortype::Gray16>(width, height).unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[1.0f64, 1.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::ModelTiepointTag,
            &[0.0f64, 0.0, 0.0, origin.0, origin.1, 0.0][..],
        )
        .unwrap();
    if let Some(code) = epsg {
        let keys: [u16; 8] = [1, 1, 0, 1, 3072, 0, 1, code];
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &keys[..])
            .unwrap();
    }
    image.write_data(data).unwrap();
}

/// A 4x4 georeferenced scene covering (0, 0)..(4, 4), red holding 1..=16.
fn georeferenced_scene(dir: &Path, epsg: Option<u16>) -> SceneRecord {
    let red = dir.join("red_geo.tif");
    let scl = dir.join("scl_geo.tif");
    let values: Vec<u16> = (1..=16).collect();
    write_georeferenced(&red, 4, 4, &values, (0.0, 4.0), epsg);
    write_georeferenced(&scl, 4, 4, &[4; 16], (0.0, 4.0), epsg);
    scene("geo", 1, &[("red", &red), ("scl", &scl)])
}

fn request_in(bounds: BoundingBox, width: usize, height: usize) -> StackRequest {
    StackRequest {
        bounds,
        ..request(width, height)
    }
}

fn scene(id: &str, d: u32, assets: &[(&str, &Path)]) -> SceneRecord {
    SceneRecord {
        id: id.to_string(),
        datetime: day(d),
        epsg: Some(3857),
        assets: assets
            .iter()
            .map(|(name, path)| (name.to_string(), format!("file://{}", path.display())))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn request(width: usize, height: usize) -> StackRequest {
    StackRequest {
        bounds: BoundingBox::new(0.0, 0.0, width as f64, height as f64),
        epsg: 3857,
        assets: vec!["red".to_string(), "scl".to_string()],
        width,
        height,
        resampling: Resampling::Nearest,
    }
}

#[test]
fn test_stack_orders_bands_and_times() {
    let dir = temp_output_dir();
    let red1 = dir.path().join("red1.tif");
    let red2 = dir.path().join("red2.tif");
    let scl = dir.path().join("scl.tif");
    write_gray16(&red1, 2, 2, &[100, 200, 300, 400]);
    write_gray16(&red2, 2, 2, &[110, 210, 310, 410]);
    write_gray8(&scl, 2, 2, &[4, 4, 9, 4]);

    let scenes = vec![
        scene("b", 5, &[("red", &red2), ("scl", &scl)]),
        scene("a", 1, &[("red", &red1), ("scl", &scl)]),
    ];

    let cube = TiffStacker::default().stack(&scenes, &request(2, 2)).unwrap();
    let shape = cube.shape();
    assert_eq!((shape.times, shape.bands, shape.height, shape.width), (2, 2, 2, 2));
    assert_eq!(cube.timestamps(), &[day(1), day(5)]);
    assert_eq!(cube.band_names(), &["red".to_string(), "scl".to_string()]);
    assert_eq!(cube.get(0, 0, 1, 1), Some(400));
    assert_eq!(cube.get(1, 0, 0, 0), Some(110));
    assert_eq!(cube.get(1, 1, 1, 0), Some(9));
}

#[test]
fn test_same_timestamp_scenes_are_mosaicked() {
    let dir = temp_output_dir();
    let west = dir.path().join("west.tif");
    let east = dir.path().join("east.tif");
    let scl = dir.path().join("scl.tif");
    write_gray16(&west, 2, 1, &[500, 0]);
    write_gray16(&east, 2, 1, &[900, 700]);
    write_gray16(&scl, 2, 1, &[4, 4]);

    let scenes = vec![
        scene("west", 3, &[("red", &west), ("scl", &scl)]),
        scene("east", 3, &[("red", &east), ("scl", &scl)]),
    ];

    let cube = TiffStacker::default().stack(&scenes, &request(2, 1)).unwrap();
    assert_eq!(cube.shape().times, 1);
    assert_eq!(cube.plane(0, 0), &[500, 700]);
}

#[test]
fn test_mismatched_size_is_resampled() {
    let dir = temp_output_dir();
    let red = dir.path().join("red.tif");
    let scl = dir.path().join("scl.tif");
    write_gray16(&red, 1, 1, &[42]);
    write_gray16(&scl, 1, 1, &[4]);

    let scenes = vec![scene("up", 1, &[("red", &red), ("scl", &scl)])];
    let cube = TiffStacker::default().stack(&scenes, &request(3, 3)).unwrap();
    assert!(cube.plane(0, 0).iter().all(|&v| v == 42));
}

#[test]
fn test_missing_asset_is_an_error() {
    let dir = temp_output_dir();
    let red = dir.path().join("red.tif");
    write_gray16(&red, 1, 1, &[42]);

    let scenes = vec![scene("no-scl", 1, &[("red", &red)])];
    let result = TiffStacker::default().stack(&scenes, &request(1, 1));
    assert!(matches!(result, Err(CatalogError::AssetMissing { .. })));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = temp_output_dir();
    let absent = dir.path().join("absent.tif");

    let scenes = vec![scene("gone", 1, &[("red", &absent), ("scl", &absent)])];
    let result = TiffStacker::default().stack(&scenes, &request(1, 1));
    assert!(matches!(result, Err(CatalogError::Io { .. })));
}

#[test]
fn test_mirror_root_resolves_remote_hrefs() {
    let dir = temp_output_dir();
    let mirrored = dir.path().join("example.com").join("s2");
    std::fs::create_dir_all(&mirrored).unwrap();
    write_gray16(&mirrored.join("red.tif"), 1, 1, &[77]);
    write_gray16(&mirrored.join("scl.tif"), 1, 1, &[5]);

    let record = SceneRecord {
        id: "remote".to_string(),
        datetime: day(2),
        epsg: None,
        assets: [
            ("red".to_string(), "https://example.com/s2/red.tif".to_string()),
            ("scl".to_string(), "https://example.com/s2/scl.tif".to_string()),
        ]
        .into_iter()
        .collect(),
    };

    let stacker = TiffStacker::new(Some(dir.path().to_path_buf()));
    let cube = stacker.stack(&[record], &request(1, 1)).unwrap();
    assert_eq!(cube.get(0, 0, 0, 0), Some(77));
    assert_eq!(cube.get(0, 1, 0, 0), Some(5));
}

#[test]
fn test_read_band_georeference() {
    let dir = temp_output_dir();
    let path = dir.path().join("geo.tif");
    write_georeferenced(&path, 4, 2, &[1; 8], (500.0, 300.0), Some(3857));

    let band = read_band(&path).unwrap();
    assert_eq!((band.width, band.height), (4, 2));
    assert_eq!(band.epsg, Some(3857));
    let extent = band.transform.unwrap().extent(band.width, band.height);
    assert_eq!(extent.to_array(), [500.0, 298.0, 504.0, 300.0]);
}

#[test]
fn test_georeferenced_asset_is_cropped_to_bounds() {
    let dir = temp_output_dir();
    let scenes = vec![georeferenced_scene(dir.path(), Some(3857))];

    // inner 2x2 window of the 4x4 raster
    let request = request_in(BoundingBox::new(1.0, 1.0, 3.0, 3.0), 2, 2);
    let cube = TiffStacker::default().stack(&scenes, &request).unwrap();
    assert_eq!(cube.plane(0, 0), &[6, 7, 10, 11]);
    assert_eq!(cube.plane(0, 1), &[4, 4, 4, 4]);
}

#[test]
fn test_bounds_past_raster_edge_are_nodata() {
    let dir = temp_output_dir();
    let scenes = vec![georeferenced_scene(dir.path(), None)];

    let request = request_in(BoundingBox::new(3.0, 0.0, 5.0, 2.0), 2, 2);
    let cube = TiffStacker::default().stack(&scenes, &request).unwrap();
    assert_eq!(cube.plane(0, 0), &[12, 0, 16, 0]);
}

#[test]
fn test_disjoint_bounds_give_empty_plane() {
    let dir = temp_output_dir();
    let scenes = vec![georeferenced_scene(dir.path(), Some(3857))];

    let request = request_in(BoundingBox::new(10.0, 10.0, 12.0, 12.0), 2, 2);
    let cube = TiffStacker::default().stack(&scenes, &request).unwrap();
    assert!(cube.plane(0, 0).iter().all(|&v| v == 0));
}

#[test]
fn test_foreign_crs_is_rejected() {
    let dir = temp_output_dir();
    let scenes = vec![georeferenced_scene(dir.path(), Some(32613))];

    let result = TiffStacker::default().stack(&scenes, &request(2, 2));
    match result {
        Err(CatalogError::CrsMismatch {
            found, expected, ..
        }) => {
            assert_eq!(found, 32613);
            assert_eq!(expected, 3857);
        }
        other => panic!("expected CRS mismatch, got {:?}", other),
    }
}
