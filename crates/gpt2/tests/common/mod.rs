use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use gpt2::{Hyperparameters, Parameter};

/// Writes a well-formed model file: a full header followed by the given
/// flat parameter values.
pub fn write_model_file(dir: &Path, hyperparameters: &Hyperparameters, values: &[f32]) -> PathBuf {
    assert_eq!(
        values.len(),
        Parameter::element_counts(hyperparameters).iter().sum::<usize>()
    );

    let path = dir.join("model.bin");
    let mut writer = BufWriter::new(File::create(&path).expect("Could not create file"));
    hyperparameters.write(&mut writer).unwrap();
    for value in values {
        writer.write_all(&value.to_le_bytes()).unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Element offset of each parameter tensor inside the flat value block.
pub fn parameter_offsets(hyperparameters: &Hyperparameters) -> [usize; 16] {
    let counts = Parameter::element_counts(hyperparameters);
    let mut offsets = [0usize; 16];
    let mut total = 0;
    for (offset, count) in offsets.iter_mut().zip(counts) {
        *offset = total;
        total += count;
    }
    offsets
}

/// A flat all-zero parameter block with the given tensors filled with
/// ones.
pub fn zero_weights_with_ones(hyperparameters: &Hyperparameters, ones: &[Parameter]) -> Vec<f32> {
    let counts = Parameter::element_counts(hyperparameters);
    let offsets = parameter_offsets(hyperparameters);
    let mut values = vec![0.0f32; counts.iter().sum()];
    for &parameter in ones {
        let start = offsets[parameter.index()];
        let count = counts[parameter.index()];
        values[start..start + count].fill(1.0);
    }
    values
}
