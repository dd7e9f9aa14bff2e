use std::path::Path;

use serde_json::{Value, json};

use sermood::analysis::FEATURE_DIM;
use sermood::ml::artifacts::{
    CNN_FILE, LABEL_ENCODER_FILE, LSTM_FILE, META_CLASSIFIER_FILE, RANDOM_FOREST_FILE,
    SCALER_FILE,
};

pub const CLASSES: [&str; 4] = ["angry", "happy", "neutral", "sad"];

/// Write a small but structurally complete ensemble into `dir`.
pub fn write_fixture_models(dir: &Path) {
    std::fs::create_dir_all(dir).expect("create model dir");
    let n = CLASSES.len();
    write(dir, LABEL_ENCODER_FILE, json!({ "classes": CLASSES }));
    write(
        dir,
        SCALER_FILE,
        json!({
            "mean": vec![0.0; FEATURE_DIM],
            "scale": vec![1.0; FEATURE_DIM],
        }),
    );
    write(dir, CNN_FILE, cnn(n));
    write(dir, LSTM_FILE, lstm(n));
    write(dir, RANDOM_FOREST_FILE, forest(n));
    write(dir, META_CLASSIFIER_FILE, meta(n));
}

/// Fixture ensemble that loads cleanly but whose CNN stage overflows on real audio.
///
/// A near-zero scale pushes every non-zero feature to infinity, so the CNN logits are
/// not finite and the stage output is rejected at request time.
pub fn write_overflowing_models(dir: &Path) {
    write_fixture_models(dir);
    let n = CLASSES.len();
    write(
        dir,
        SCALER_FILE,
        json!({
            "mean": vec![0.0; FEATURE_DIM],
            "scale": vec![1e-300; FEATURE_DIM],
        }),
    );
    write(
        dir,
        CNN_FILE,
        json!({
            "input_shape": [FEATURE_DIM, 1],
            "layers": [
                { "type": "flatten" },
                {
                    "type": "dense",
                    "kernel": dense_rows(FEATURE_DIM, n),
                    "bias": vec![0.0; n],
                    "activation": "softmax"
                }
            ]
        }),
    );
}

fn write(dir: &Path, name: &str, value: Value) {
    let text = serde_json::to_string_pretty(&value).expect("serialize fixture");
    std::fs::write(dir.join(name), text).expect("write fixture");
}

fn dense_rows(inputs: usize, classes: usize) -> Vec<Vec<f32>> {
    (0..inputs)
        .map(|i| {
            (0..classes)
                .map(|c| ((i * 7 + c * 3) % 5) as f32 * 0.1 - 0.2)
                .collect()
        })
        .collect()
}

fn cnn(classes: usize) -> Value {
    json!({
        "input_shape": [FEATURE_DIM, 1],
        "layers": [
            {
                "type": "conv1d",
                "kernel": [[[0.5, -0.25]], [[1.0, 0.5]], [[-0.5, 0.25]]],
                "bias": [0.0, 0.1],
                "padding": "same",
                "activation": "relu"
            },
            { "type": "max_pool1d", "pool_size": 2 },
            { "type": "global_average_pool1d" },
            { "type": "dropout" },
            {
                "type": "dense",
                "kernel": dense_rows(2, classes),
                "bias": vec![0.0; classes],
                "activation": "softmax"
            }
        ]
    })
}

fn lstm(classes: usize) -> Value {
    let units = 2;
    json!({
        "input_shape": [FEATURE_DIM, 1],
        "layers": [
            {
                "type": "lstm",
                "units": units,
                "kernel": [[0.1, -0.1, 0.2, 0.05, 0.3, 0.0, -0.2, 0.1]],
                "recurrent_kernel": vec![vec![0.05; 4 * units]; units],
                "bias": [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
                "return_sequences": false
            },
            {
                "type": "dense",
                "kernel": dense_rows(units, classes),
                "bias": vec![0.0; classes],
                "activation": "softmax"
            }
        ]
    })
}

/// One stump splitting on the zero-crossing rate slot.
fn forest(classes: usize) -> Value {
    let mut low = vec![0.0; classes];
    low[0] = 4.0;
    low[2] = 1.0;
    let mut high = vec![0.0; classes];
    high[1] = 4.0;
    high[3] = 1.0;
    json!({
        "n_features": FEATURE_DIM,
        "n_classes": classes,
        "trees": [{
            "children_left": [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature": [0, -2, -2],
            "threshold": [0.05, -2.0, -2.0],
            "value": [vec![1.0; classes], low, high]
        }]
    })
}

/// Logistic regression that follows the forest block of the stacked inputs.
fn meta(classes: usize) -> Value {
    let coef: Vec<Vec<f64>> = (0..classes)
        .map(|class| {
            let mut row = vec![0.0; 3 * classes];
            row[2 * classes + class] = 2.0;
            row[class] = 0.1;
            row
        })
        .collect();
    json!({
        "kind": "logistic_regression",
        "coef": coef,
        "intercept": vec![0.0; classes]
    })
}
