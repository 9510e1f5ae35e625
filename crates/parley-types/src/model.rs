//! Value types exchanged with a recurrent language model.
//!
//! The model itself is an external collaborator. These types describe what
//! crosses the boundary: token ids, the fixed-size recurrent state, next-token
//! logits, and the parameter tree used for device placement.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Vocabulary index of a single token.
pub type TokenId = u32;

/// Fixed-size vector summarizing everything folded into the model so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecurrentState(pub Vec<f32>);

impl RecurrentState {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Unnormalized next-token scores, one per vocabulary entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Logits(pub Vec<f32>);

impl Logits {
    /// Index of the highest score. Ties resolve to the lowest index and NaN
    /// entries are never selected. `None` when there is no finite score.
    pub fn argmax(&self) -> Option<TokenId> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, &score) in self.0.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((idx, score)),
            }
        }
        best.map(|(idx, _)| idx as TokenId)
    }
}

/// How much of the transition function to evaluate for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Only advance the state; no logits are produced.
    StateOnly,
    /// Advance the state and compute next-token logits.
    Full,
}

/// Result of folding one token into the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub logits: Option<Logits>,
    pub state: RecurrentState,
}

/// Where a tensor lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Host,
    Accelerator,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Host => f.write_str("host"),
            Device::Accelerator => f.write_str("accelerator"),
        }
    }
}

/// Size and location of one parameter tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub elements: u64,
    pub element_size: u32,
    pub device: Device,
}

impl TensorInfo {
    pub fn bytes(&self) -> u64 {
        self.elements.saturating_mul(u64::from(self.element_size))
    }
}

/// Dotted path from the root of a [`ParamTree`] to a leaf, e.g. `blocks.0.att.key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamPath(Vec<String>);

impl ParamPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for ParamPath {
    fn from(value: &str) -> Self {
        Self(
            value
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// The model's parameter set as a tagged tree of named groups and tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamTree {
    Group { children: BTreeMap<String, ParamTree> },
    Leaf { tensor: TensorInfo },
}

impl ParamTree {
    pub fn leaf(elements: u64, element_size: u32, device: Device) -> Self {
        ParamTree::Leaf {
            tensor: TensorInfo {
                elements,
                element_size,
                device,
            },
        }
    }

    pub fn group<I, K>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, ParamTree)>,
        K: Into<String>,
    {
        ParamTree::Group {
            children: children.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Visit every leaf depth-first in key order.
    pub fn visit_leaves<F>(&self, f: &mut F)
    where
        F: FnMut(&ParamPath, &TensorInfo),
    {
        self.visit_from(&ParamPath::root(), f);
    }

    fn visit_from<F>(&self, path: &ParamPath, f: &mut F)
    where
        F: FnMut(&ParamPath, &TensorInfo),
    {
        match self {
            ParamTree::Leaf { tensor } => f(path, tensor),
            ParamTree::Group { children } => {
                for (name, child) in children {
                    child.visit_from(&path.child(name), f);
                }
            }
        }
    }

    /// Total size in bytes of every leaf tensor.
    pub fn total_bytes(&self) -> u64 {
        let mut total = 0u64;
        self.visit_leaves(&mut |_, tensor| total = total.saturating_add(tensor.bytes()));
        total
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.visit_leaves(&mut |_, _| count += 1);
        count
    }
}

/// One entry of the model catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identity; also the checkpoint key.
    pub name: String,
    pub parameter_count: u64,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, parameter_count: u64) -> Self {
        Self {
            name: name.into(),
            parameter_count,
        }
    }
}
