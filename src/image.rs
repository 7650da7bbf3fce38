use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Pseudo random RGB color of a label, stable for a given id. Background stays black.
pub fn label_color(label: u32) -> [u8; 3] {
    if label == 0 {
        return [0, 0, 0];
    }

    let mut rng = StdRng::seed_from_u64(label as u64);

    [rng.gen(), rng.gen(), rng.gen()]
}

/// Renders a label grid as a `rows x cols x 3` RGB image.
pub fn colorize(labels: &Array2<u32>) -> Array3<u8> {
    let (rows, cols) = labels.dim();
    let mut image = Array3::zeros((rows, cols, 3));
    let mut palette: HashMap<u32, [u8; 3]> = HashMap::new();

    for ((row, col), &label) in labels.indexed_iter() {
        if label == 0 {
            continue;
        }

        let color = *palette.entry(label).or_insert_with(|| label_color(label));
        for (channel, value) in color.iter().enumerate() {
            image[[row, col, channel]] = *value;
        }
    }

    image
}
