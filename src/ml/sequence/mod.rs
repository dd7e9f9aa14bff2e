//! Feed-forward and recurrent sequence classifiers evaluated layer by layer.
//!
//! A model declares its input as `[steps, channels]` and a list of layers whose weights
//! use Keras layouts. Shapes are inferred statically when the model is validated, so a
//! model that loads is guaranteed to produce a vector of the declared width.

use serde::{Deserialize, Serialize};

mod layers;

pub use layers::{Activation, Layer, Padding, Shape, Tensor};

/// Layered sequence classifier (the CNN and LSTM ensemble members).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceModel {
    /// `[steps, channels]` of a single input sample.
    pub input_shape: [usize; 2],
    pub layers: Vec<Layer>,
}

impl SequenceModel {
    pub fn input_shape(&self) -> Shape {
        Shape::Sequence {
            steps: self.input_shape[0],
            channels: self.input_shape[1],
        }
    }

    /// Infer the output shape, failing on the first layer whose weights do not fit.
    pub fn output_shape(&self) -> Result<Shape, String> {
        let mut shape = self.input_shape();
        if shape.is_empty() {
            return Err(format!("input shape {shape} is empty"));
        }
        for (idx, layer) in self.layers.iter().enumerate() {
            shape = layer
                .output_shape(shape)
                .map_err(|err| format!("layer {idx} ({}): {err}", layer.name()))?;
            if shape.is_empty() {
                return Err(format!("layer {idx} ({}) produces no values", layer.name()));
            }
        }
        Ok(shape)
    }

    /// Validate that the model maps `[steps, 1]` to a vector of `n_outputs`.
    pub fn validate(&self, steps: usize, n_outputs: usize) -> Result<(), String> {
        let expected_input = Shape::Sequence { steps, channels: 1 };
        if self.input_shape() != expected_input {
            return Err(format!(
                "input shape {} does not match {expected_input}",
                self.input_shape()
            ));
        }
        let expected_output = Shape::Vector { len: n_outputs };
        let output = self.output_shape()?;
        if output != expected_output {
            return Err(format!(
                "output shape {output} does not match {expected_output}"
            ));
        }
        Ok(())
    }

    /// Run one sample (step-major values) through every layer.
    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>, String> {
        let shape = self.input_shape();
        if input.len() != shape.len() {
            return Err(format!(
                "input has {} values, model expects {shape}",
                input.len()
            ));
        }
        let mut tensor = Tensor {
            shape,
            data: input.to_vec(),
        };
        for (idx, layer) in self.layers.iter().enumerate() {
            tensor = layer
                .forward(tensor)
                .map_err(|err| format!("layer {idx} ({}): {err}", layer.name()))?;
        }
        match tensor.shape {
            Shape::Vector { .. } => Ok(tensor.data),
            other => Err(format!("model ended on a sequence {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_cnn(steps: usize, classes: usize) -> SequenceModel {
        SequenceModel {
            input_shape: [steps, 1],
            layers: vec![
                Layer::Conv1d {
                    kernel: vec![vec![vec![0.5, -0.5]]; 3],
                    bias: vec![0.0, 0.1],
                    stride: 1,
                    padding: Padding::Same,
                    activation: Activation::Relu,
                },
                Layer::MaxPool1d {
                    pool_size: 2,
                    stride: None,
                    padding: Padding::Same,
                },
                Layer::Dropout,
                Layer::Flatten,
                Layer::Dense {
                    kernel: vec![vec![0.1; classes]; steps.div_ceil(2) * 2],
                    bias: (0..classes).map(|c| c as f32 * 0.01).collect(),
                    activation: Activation::Softmax,
                },
            ],
        }
    }

    #[test]
    fn shape_inference_walks_every_layer() {
        let model = tiny_cnn(9, 4);
        assert_eq!(model.output_shape(), Ok(Shape::Vector { len: 4 }));
        assert!(model.validate(9, 4).is_ok());
        assert!(model.validate(10, 4).is_err());
        assert!(model.validate(9, 5).is_err());
    }

    #[test]
    fn predict_returns_a_distribution() {
        let model = tiny_cnn(9, 4);
        let out = model.predict(&[0.3; 9]).unwrap();
        assert_eq!(out.len(), 4);
        assert!((out.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(model.predict(&[0.3; 8]).is_err());
    }

    #[test]
    fn broken_layer_is_named_in_the_error() {
        let mut model = tiny_cnn(9, 4);
        model.layers.push(Layer::GlobalAveragePool1d);
        let err = model.output_shape().unwrap_err();
        assert!(err.contains("layer 5 (global_average_pool1d)"), "{err}");
    }

    #[test]
    fn deserializes_tagged_layers() {
        let json = r#"{
            "input_shape": [3, 1],
            "layers": [
                {"type": "lstm", "units": 1, "kernel": [[0,0,0,0]],
                 "recurrent_kernel": [[0,0,0,0]], "bias": [0,0,0,0]},
                {"type": "dense", "kernel": [[1, -1]], "bias": [0, 0],
                 "activation": "softmax"}
            ]
        }"#;
        let model: SequenceModel = serde_json::from_str(json).unwrap();
        assert!(model.validate(3, 2).is_ok());
        assert_eq!(model.predict(&[1.0, 2.0, 3.0]).unwrap(), vec![0.5, 0.5]);
    }
}
