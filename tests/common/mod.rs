//! Builds tiny ONNX checkpoints for tests.
//!
//! The graph is `GlobalAveragePool -> Flatten -> Gemm(3 -> classes)`, which
//! takes the same `[N, 3, 224, 224]` input as the real network. Models are
//! encoded straight to protobuf wire format so no export tooling is needed.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

const WIRE_VARINT: u64 = 0;
const WIRE_LEN: u64 = 2;
const TENSOR_FLOAT: u64 = 1;

fn varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn key(buf: &mut Vec<u8>, field: u64, wire: u64) {
    varint(buf, (field << 3) | wire);
}

fn uint(buf: &mut Vec<u8>, field: u64, value: u64) {
    key(buf, field, WIRE_VARINT);
    varint(buf, value);
}

fn bytes(buf: &mut Vec<u8>, field: u64, data: &[u8]) {
    key(buf, field, WIRE_LEN);
    varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

fn string(buf: &mut Vec<u8>, field: u64, value: &str) {
    bytes(buf, field, value.as_bytes());
}

enum Dim {
    Fixed(u64),
    Named(&'static str),
}

/// ValueInfoProto for a float tensor.
fn value_info(name: &str, dims: &[Dim]) -> Vec<u8> {
    let mut shape = Vec::new();
    for dim in dims {
        let mut d = Vec::new();
        match dim {
            Dim::Fixed(v) => uint(&mut d, 1, *v),
            Dim::Named(p) => string(&mut d, 2, p),
        }
        bytes(&mut shape, 1, &d);
    }

    let mut tensor_type = Vec::new();
    uint(&mut tensor_type, 1, TENSOR_FLOAT);
    bytes(&mut tensor_type, 2, &shape);

    let mut type_proto = Vec::new();
    bytes(&mut type_proto, 1, &tensor_type);

    let mut info = Vec::new();
    string(&mut info, 1, name);
    bytes(&mut info, 2, &type_proto);
    info
}

/// TensorProto holding float data as raw little-endian bytes.
fn initializer(name: &str, dims: &[u64], values: &[f32]) -> Vec<u8> {
    let mut tensor = Vec::new();
    for &d in dims {
        uint(&mut tensor, 1, d);
    }
    uint(&mut tensor, 2, TENSOR_FLOAT);
    string(&mut tensor, 8, name);
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    bytes(&mut tensor, 9, &raw);
    tensor
}

fn node(op_type: &str, inputs: &[&str], outputs: &[&str]) -> Vec<u8> {
    let mut n = Vec::new();
    for input in inputs {
        string(&mut n, 1, input);
    }
    for output in outputs {
        string(&mut n, 2, output);
    }
    string(&mut n, 3, &format!("{}_0", op_type.to_lowercase()));
    string(&mut n, 4, op_type);
    n
}

/// Parameters of a fixture checkpoint.
pub struct FixtureModel {
    pub num_classes: usize,
    /// Added to every logit; index 0 gets the largest value by default
    pub bias: Vec<f32>,
    /// Value stored under the `model_spec` metadata key, if any
    pub spec_metadata: Option<String>,
}

impl FixtureModel {
    /// A checkpoint compatible with the deployed spec that favours `XR_ELBOW`.
    pub fn elbow() -> Self {
        Self {
            num_classes: 7,
            bias: vec![4.0, 0.5, 0.25, 0.0, -0.25, -0.5, -1.0],
            spec_metadata: Some("mura-bodypart-densenet121-v1".to_string()),
        }
    }

    /// Same graph with an ImageNet-sized output layer.
    pub fn imagenet_head() -> Self {
        Self {
            num_classes: 1000,
            bias: vec![0.0; 1000],
            spec_metadata: None,
        }
    }

    pub fn with_spec_metadata(mut self, value: &str) -> Self {
        self.spec_metadata = Some(value.to_string());
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let classes = self.num_classes as u64;
        // Small weights keep the bias in charge of the ranking.
        let weights: Vec<f32> = (0..3 * self.num_classes)
            .map(|i| ((i % 5) as f32 - 2.0) * 0.01)
            .collect();

        let mut graph = Vec::new();
        bytes(&mut graph, 1, &node("GlobalAveragePool", &["input"], &["pooled"]));
        bytes(&mut graph, 1, &node("Flatten", &["pooled"], &["features"]));
        bytes(&mut graph, 1, &node("Gemm", &["features", "head.weight", "head.bias"], &["logits"]));
        string(&mut graph, 2, "mura_fixture");
        bytes(&mut graph, 5, &initializer("head.weight", &[3, classes], &weights));
        bytes(&mut graph, 5, &initializer("head.bias", &[classes], &self.bias));
        bytes(
            &mut graph,
            11,
            &value_info(
                "input",
                &[Dim::Named("batch"), Dim::Fixed(3), Dim::Fixed(224), Dim::Fixed(224)],
            ),
        );
        bytes(&mut graph, 12, &value_info("logits", &[Dim::Named("batch"), Dim::Fixed(classes)]));

        let mut opset = Vec::new();
        string(&mut opset, 1, "");
        uint(&mut opset, 2, 13);

        let mut model = Vec::new();
        uint(&mut model, 1, 7); // ir_version
        string(&mut model, 2, "mura-bodypart-tests");
        bytes(&mut model, 7, &graph);
        bytes(&mut model, 8, &opset);
        if let Some(value) = &self.spec_metadata {
            let mut entry = Vec::new();
            string(&mut entry, 1, "model_spec");
            string(&mut entry, 2, value);
            bytes(&mut model, 14, &entry);
        }
        model
    }

    pub fn write_to(&self, path: &Path) -> PathBuf {
        std::fs::write(path, self.encode()).expect("failed to write fixture model");
        path.to_path_buf()
    }
}

/// Copies the compiled binary into `dir` so it resolves its checkpoint there.
pub fn install_binary(dir: &Path) -> PathBuf {
    let source = PathBuf::from(env!("CARGO_BIN_EXE_mura-bodypart"));
    let target = dir.join(source.file_name().expect("binary has a file name"));
    std::fs::copy(&source, &target).expect("failed to copy binary");
    target
}

/// Writes a grayscale radiograph-like PNG.
pub fn write_radiograph(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    image::DynamicImage::ImageLuma8(image::GrayImage::from_fn(320, 400, |x, y| {
        image::Luma([((x * 5 + y * 3) % 256) as u8])
    }))
    .save(&path)
    .expect("failed to write test image");
    path
}
