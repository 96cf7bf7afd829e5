use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use srvis_core::LocalisationTable;
use srvis_histogram::{
    Colormap, FixedGridHistogram, GaussianBlur, GridParams, QuadTree, QuadTreeParams,
};

fn cloud(n: usize, seed: u64) -> LocalisationTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut frame = Vec::with_capacity(n);
    for i in 0..n {
        // a dense spot on a uniform background
        if i % 4 == 0 {
            x.push(250.0 + rng.gen_range(-5.0..5.0));
            y.push(250.0 + rng.gen_range(-5.0..5.0));
        } else {
            x.push(rng.gen_range(0.0..500.0));
            y.push(rng.gen_range(0.0..500.0));
        }
        frame.push((i / 100) as f64);
    }
    LocalisationTable::from_xyt(x, y, frame).unwrap()
}

#[test]
fn grid_counts_every_localisation() {
    let table = cloud(10_000, 11);
    let mut hist = FixedGridHistogram::new(table.points());
    for bin_size in [1.0, 5.0, 33.0] {
        let out = hist
            .compute(&GridParams {
                bin_size,
                ..GridParams::default()
            })
            .unwrap();
        assert_eq!(out.counts.sum(), 10_000.0);
        assert!(out.scale_min() < out.scale_max());
    }
}

#[test]
fn blurred_grid_peaks_at_dense_spot() {
    let table = cloud(10_000, 12);
    let mut hist = FixedGridHistogram::new(table.points());
    let out = hist
        .compute(&GridParams {
            bin_size: 10.0,
            blur: Some(GaussianBlur::new(1.0)),
            ..GridParams::default()
        })
        .unwrap();
    let total = out.counts.sum();
    assert!((total - 10_000.0).abs() < 100.0, "total {total}");

    let (peak, _) = out
        .counts
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
    let (row, col) = (peak % out.counts.nrows(), peak / out.counts.nrows());
    let [y_min, _, _, x_min] = out.extent;
    let centre = |lo: f64, i: usize| lo + 10.0 * (i as f64 + 0.5);
    assert!((centre(x_min, row) - 250.0).abs() <= 10.0);
    assert!((centre(y_min, col) - 250.0).abs() <= 10.0);
}

#[test]
fn dense_spot_gets_small_bright_cells() {
    let table = cloud(10_000, 13);
    let tree = QuadTree::build(&table.points(), &QuadTreeParams::default()).unwrap();
    let (patches, legend) = tree.patches(None, None, Colormap::GistHeat).unwrap();

    let spot = Point2::new(250.0, 250.0);
    let at_spot = patches
        .iter()
        .find(|p| {
            spot.x >= p.mins.x
                && spot.x < p.mins.x + p.size[0]
                && spot.y >= p.mins.y
                && spot.y < p.mins.y + p.size[1]
        })
        .expect("a patch covers the spot");
    let largest = patches
        .iter()
        .map(|p| p.size[0] * p.size[1])
        .fold(0.0, f64::max);
    assert!(at_spot.size[0] * at_spot.size[1] < largest);
    assert!(at_spot.density >= legend.max);
}
