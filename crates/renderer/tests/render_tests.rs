//! Tests for frame rendering and output writers.

use compositor::Composite;
use renderer::png::write_png;
use renderer::{
    is_ffmpeg_on_path, render, transcode, ChannelOrder, EncodeConfig, FfmpegEncoder, RenderError,
    RenderOptions,
};
use test_utils::temp_output_dir;

fn uniform(width: usize, height: usize, value: Option<f32>) -> Composite {
    Composite {
        band_names: vec!["blue".into(), "green".into(), "red".into()],
        height,
        width,
        data: vec![value; 3 * width * height],
    }
}

#[test]
fn test_all_nodata_renders_black_without_clipping() {
    for value in [None, Some(0.0)] {
        let image = render(&uniform(4, 3, value), &RenderOptions::default()).unwrap();
        assert_eq!(image.data.len(), 4 * 3 * 3);
        assert!(image.data.iter().all(|&b| b == 0));
        assert_eq!(image.clipped, 0);
    }
}

#[test]
fn test_display_scale_saturates_exactly() {
    let options = RenderOptions::default();

    let at_scale = render(&uniform(2, 2, Some(options.display_scale)), &options).unwrap();
    assert!(at_scale.data.iter().all(|&b| b == 255));
    assert_eq!(at_scale.clipped, 0);

    let above = render(&uniform(2, 2, Some(options.display_scale + 1.0)), &options).unwrap();
    assert!(above.data.iter().all(|&b| b == 255));
    assert_eq!(above.clipped, 2 * 2 * 3);
}

#[test]
fn test_just_below_scale_truncates() {
    let options = RenderOptions::default();
    let image = render(&uniform(1, 1, Some(1999.0)), &options).unwrap();
    // 1999 * 255 / 2000 = 254.87
    assert_eq!(image.pixel(0, 0), Some([254, 254, 254]));
}

#[test]
fn test_extra_bands_are_ignored() {
    let composite = Composite {
        band_names: vec!["blue".into(), "green".into(), "red".into(), "nir".into()],
        height: 1,
        width: 1,
        data: vec![Some(0.0), Some(0.0), Some(2000.0), Some(9999.0)],
    };
    let image = render(&composite, &RenderOptions::default()).unwrap();
    assert_eq!(image.pixel(0, 0), Some([0, 0, 255]));
    assert_eq!(image.clipped, 0);
}

#[test]
fn test_too_few_bands() {
    let composite = Composite {
        band_names: vec!["blue".into(), "green".into()],
        height: 1,
        width: 1,
        data: vec![Some(1.0), Some(1.0)],
    };
    assert!(matches!(
        render(&composite, &RenderOptions::default()),
        Err(RenderError::MissingBands { found: 2 })
    ));
}

#[test]
fn test_write_png_still() {
    let dir = temp_output_dir();
    let path = dir.path().join("videomap-12-852-1551-2022-01-15.png");

    let image = render(&uniform(8, 8, Some(1000.0)), &RenderOptions::default()).unwrap();
    write_png(&path, &image).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    assert_eq!(&bytes[12..16], b"IHDR");
}

#[test]
fn test_encoder_rejects_wrong_frame_size() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = temp_output_dir();
    let mut encoder = FfmpegEncoder::new(EncodeConfig::mp4(dir.path().join("v.mp4"), 4, 4, 4)).unwrap();

    let frame = render(&uniform(2, 2, Some(500.0)), &RenderOptions::default()).unwrap();
    assert!(matches!(
        encoder.encode_frame(&frame),
        Err(RenderError::Validation(_))
    ));
}

#[test]
fn test_encode_and_transcode() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = temp_output_dir();
    let mp4 = dir.path().join("videomap-1-0-0.mp4");
    let webm = dir.path().join("videomap-1-0-0.webm");

    let config = EncodeConfig {
        channel_order: ChannelOrder::Rgb,
        ..EncodeConfig::mp4(&mp4, 16, 16, 4)
    };
    let options = RenderOptions {
        channel_order: ChannelOrder::Rgb,
        ..RenderOptions::default()
    };

    let mut encoder = match FfmpegEncoder::new(config) {
        Ok(encoder) => encoder,
        Err(e) => {
            eprintln!("skipping: {}", e);
            return;
        }
    };
    for value in [200.0, 800.0, 1600.0] {
        let frame = render(&uniform(16, 16, Some(value)), &options).unwrap();
        encoder.encode_frame(&frame).unwrap();
    }

    // not every ffmpeg build ships libx264 or a webm encoder
    if encoder.finish().is_err() {
        eprintln!("skipping: ffmpeg lacks the mp4 encoder");
        return;
    }
    assert!(mp4.exists());

    if transcode(&mp4, &webm).is_ok() {
        assert!(webm.exists());
    }
}

#[test]
fn test_dropped_encoder_removes_partial_output() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = temp_output_dir();
    let mp4 = dir.path().join("videomap-2-1-1.mp4");
    let mut encoder = FfmpegEncoder::new(EncodeConfig::mp4(&mp4, 16, 16, 4)).unwrap();

    let frame = render(&uniform(16, 16, Some(800.0)), &RenderOptions::default()).unwrap();
    encoder.encode_frame(&frame).unwrap();
    drop(encoder);

    assert!(!mp4.exists());
}
