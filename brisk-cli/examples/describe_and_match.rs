use brisk_cli::{grid_keypoints, BriskPipeline, ExtractorBuilder, MatchMode};
use image::{imageops, GrayImage, Luma};
use std::time::Instant;

fn synthetic_scene(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        let blobs = 60.0 * ((fx * 0.05).sin() * (fy * 0.043).cos());
        let noise = ((x.wrapping_mul(73) ^ y.wrapping_mul(151)) % 29) as f32;
        Luma([(110.0 + blobs + noise).clamp(0.0, 255.0) as u8])
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("BRISK describe + match demo");
    println!("===========================\n");

    let scene = synthetic_scene(320, 240);
    let rotated = imageops::rotate90(&scene);

    let config = ExtractorBuilder::new()
        .pattern_scale(1.0)
        .threads(num_threads())
        .to_config()?
        .with_metadata("Demo", "Rotation- and scale-invariant, default discretization");
    println!("{}", config.summary());

    let pipeline = BriskPipeline::new(config)?;

    let t0 = Instant::now();
    let mut kps_a = grid_keypoints(320, 240, 24, 14.0);
    let desc_a = pipeline.describe(&scene, &mut kps_a)?;
    // Grid positions mapped through the 90 degree clockwise rotation.
    let mut kps_b: Vec<_> = kps_a
        .iter()
        .map(|kp| brisk_cli::brisk_core::Keypoint::new(239.0 - kp.y, kp.x, kp.size))
        .collect();
    let desc_b = pipeline.describe(&rotated, &mut kps_b)?;
    println!(
        "Described {} + {} keypoints in {:.2?}",
        desc_a.rows(),
        desc_b.rows(),
        t0.elapsed()
    );

    let matches = BriskPipeline::match_descriptors(&desc_a, &desc_b, MatchMode::Knn(2), true)?;
    let consistent = matches
        .iter()
        .filter_map(|row| row.first())
        .filter(|m| {
            let (a, b) = (kps_a[m.query_idx], kps_b[m.train_idx]);
            (239.0 - a.y - b.x).abs() < 0.5 && (a.x - b.y).abs() < 0.5
        })
        .count();
    println!("{} / {} nearest neighbours land on the rotated counterpart", consistent, matches.len());

    let close = BriskPipeline::match_descriptors(&desc_a, &desc_b, MatchMode::Radius(60.0), true)?;
    println!("{} queries have a neighbour within 60 bits", close.len());
    Ok(())
}

fn num_threads() -> usize {
    brisk_cli::brisk_core::default_threads()
}
