//! Neural network inference.
//!
//! Perception models are ONNX networks loaded from the filesystem. Inference runs either on the
//! CPU (via [`tract`]) or on a GPU delegate (via [`wonnx`]); the delegate is selected at load time
//! with [`Loader::with_delegate`]. GPU support depends on the host exposing a usable adapter and
//! on the network only using operations the GPU backend implements, so loading with
//! [`Delegate::Gpu`] is expected to fail on some machines; callers retry with [`Delegate::Cpu`].
//!
//! [`tract`]: https://github.com/sonos/tract
//! [`wonnx`]: https://github.com/webonnx/wonnx

pub mod tensor;

use crate::image::{Color, Image};
use crate::resolution::Resolution;
use tensor::Tensor;
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};
use wonnx::utils::{InputTensor, OutputTensor};

use std::{
    borrow::Cow,
    ops::{Index, Range, RangeInclusive},
    path::Path,
    sync::Arc,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// The compute device a network executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delegate {
    /// Execute the network on a GPU via `wonnx`.
    Gpu,
    /// Execute the network on the CPU via `tract`.
    Cpu,
}

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    image_map: Arc<dyn Fn(&Image) -> Tensor + Send + Sync>,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`].
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn, shape)?;
        let (h, w) = (input_res.height() as usize, input_res.width() as usize);

        fn sample(image: &Image, u: f32, v: f32) -> Color {
            let x = (u * image.width() as f32).round() as i64;
            let y = (v * image.height() as f32).round() as i64;
            image.get(
                x.clamp(0, image.width() as i64 - 1) as u32,
                y.clamp(0, image.height() as i64 - 1) as u32,
            )
        }

        // Box a closure that maps the whole input image to a tensor, so that the layout dispatch
        // happens once per network rather than once per pixel.
        let image_map: Arc<dyn Fn(&Image) -> _ + Send + Sync> = match shape {
            CnnInputShape::NCHW => Arc::new(move |image| {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| {
                    color_mapper.map(sample(image, x as f32 / w as f32, y as f32 / h as f32))[c]
                })
            }),
            CnnInputShape::NHWC => Arc::new(move |image| {
                Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| {
                    color_mapper.map(sample(image, x as f32 / w as f32, y as f32 / h as f32))[c]
                })
            }),
        };

        Ok(Self {
            nn,
            input_res,
            image_map,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let input_info = nn.inputs().next().unwrap();
        let tensor_shape = input_info.shape();

        let (w, h) = match (shape, tensor_shape) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => {
                anyhow::bail!(
                    "invalid model input shape for {:?} CNN: {:?}",
                    shape,
                    tensor_shape,
                );
            }
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on an input image, returning the estimated outputs.
    ///
    /// The input image is resampled to the network's input resolution. If the aspect ratios
    /// differ, the image is stretched; extraction code compensates by scaling X and Y back to the
    /// source independently.
    pub fn estimate(&self, image: &Image) -> anyhow::Result<Outputs> {
        let tensor = (self.image_map)(image);
        self.nn.estimate(&Inputs::from(tensor))
    }
}

enum ColorMapperKind {
    Linear { target_range: RangeInclusive<f32> },
}

/// Maps sRGB color values into the value range a network expects.
pub struct ColorMapper {
    kind: ColorMapperKind,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range, which matches what the supported networks expect.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start);

        Self {
            kind: ColorMapperKind::Linear { target_range },
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        match &self.kind {
            ColorMapperKind::Linear { target_range } => {
                let start = *target_range.start();
                let end = *target_range.end();

                let adjust_range = (end - start) / 255.0;
                let rgb = [color.r(), color.g(), color.b()];
                rgb.map(|col| col as f32 * adjust_range + start)
            }
        }
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, fixed at 1 here.
/// - `C` is the number of color channels, 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// Neural network loader.
pub struct Loader<'a> {
    model_data: Cow<'a, [u8]>,
    outputs: Option<Vec<usize>>,
    delegate: Delegate,
}

impl<'a> Loader<'a> {
    fn new(data: Cow<'a, [u8]>) -> Self {
        Self {
            model_data: data,
            outputs: None,
            delegate: Delegate::Cpu,
        }
    }

    /// Selects the compute delegate to load the network for.
    ///
    /// Loading with [`Delegate::Gpu`] fails when no usable GPU adapter is present or when the
    /// network uses operations the GPU backend does not implement.
    pub fn with_delegate(mut self, delegate: Delegate) -> Self {
        self.delegate = delegate;
        self
    }

    /// Only compute the specified outputs during inference.
    ///
    /// This takes a list of indices into the network's output list. The [`Outputs`] returned from
    /// [`NeuralNetwork::estimate`] will then only contain the chosen output tensors, in the given
    /// order.
    pub fn with_output_selection<O>(mut self, outputs: O) -> Self
    where
        O: Into<Vec<usize>>,
    {
        self.outputs = Some(outputs.into());
        self
    }

    /// Loads and optimizes the network.
    ///
    /// Returns an error if the network data is malformed or incomplete, if the network uses
    /// unimplemented operations, or if the selected [`Delegate`] cannot run it.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*self.model_data)?
            .into_optimized()?;
        let outputs = graph.output_outlets()?;
        let selected_outputs = match self.outputs {
            Some(indices) => indices.iter().map(|&i| outputs[i]).collect::<Vec<_>>(),
            None => outputs.to_vec(),
        };
        let model = SimplePlan::new_for_outputs(graph, &selected_outputs)?;

        let gpu = match self.delegate {
            Delegate::Gpu => Some(pollster::block_on(wonnx::Session::from_bytes(
                &self.model_data,
            ))?),
            Delegate::Cpu => None,
        };

        Ok(NeuralNetwork(Arc::new(NeuralNetworkImpl {
            inner: model,
            gpu,
        })))
    }
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<NeuralNetworkImpl>);

struct NeuralNetworkImpl {
    inner: Model,
    gpu: Option<wonnx::Session>,
}

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<'a, P: AsRef<Path>>(path: P) -> anyhow::Result<Loader<'a>> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl<'a>(path: &Path) -> anyhow::Result<Loader<'a>> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path)?;
        Ok(Loader::new(model_data.into()))
    }

    /// Loads a pre-trained model from an in-memory ONNX file.
    pub fn from_onnx(raw: &[u8]) -> Loader<'_> {
        Loader::new(raw.into())
    }

    /// Returns the [`Delegate`] this network was loaded for.
    pub fn delegate(&self) -> Delegate {
        if self.0.gpu.is_some() {
            Delegate::Gpu
        } else {
            Delegate::Cpu
        }
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.inner.model().inputs.len()
    }

    /// Returns the number of output nodes of the network.
    pub fn num_outputs(&self) -> usize {
        self.0.inner.model().outputs.len()
    }

    /// Returns an iterator over the network's input node information.
    pub fn inputs(&self) -> InputInfoIter<'_> {
        InputInfoIter {
            net: self,
            ids: 0..self.num_inputs(),
        }
    }

    /// Returns an iterator over the network's output node information.
    pub fn outputs(&self) -> OutputInfoIter<'_> {
        OutputInfoIter {
            net: self,
            ids: 0..self.num_outputs(),
        }
    }

    /// Runs the network on a set of [`Inputs`], returning the estimated [`Outputs`].
    ///
    /// Computation happens on the delegate the network was loaded for.
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let outputs = match &self.0.gpu {
            Some(gpu) => {
                let inputs = self
                    .inputs()
                    .zip(inputs.iter())
                    .map(|(info, tensor)| {
                        let name = info.name().to_string();
                        let input = InputTensor::F32(tensor.as_raw_data().into());
                        (name, input)
                    })
                    .collect();

                let output_map = pollster::block_on(gpu.run(&inputs))?;
                let mut outputs = TVec::new();
                for info in self.outputs() {
                    let tensor = &output_map[info.name()];
                    match tensor {
                        OutputTensor::F32(tensor) => {
                            outputs.push(Tensor::from_iter(info.shape(), tensor.iter().copied()));
                        }
                        _ => anyhow::bail!("GPU backend returned a non-f32 output tensor"),
                    }
                }

                Outputs { inner: outputs }
            }
            None => {
                let outputs = self.0.inner.run(
                    inputs
                        .iter()
                        .map(|t| TValue::from_const(Arc::new(t.to_tract())))
                        .collect(),
                )?;
                let outputs = outputs
                    .into_iter()
                    .map(|tract| Tensor::from_tract(&tract))
                    .collect();
                Outputs { inner: outputs }
            }
        };

        Ok(outputs)
    }
}

/// Iterator over a [`NeuralNetwork`]s input information.
pub struct InputInfoIter<'a> {
    net: &'a NeuralNetwork,
    ids: Range<usize>,
}

impl<'a> Iterator for InputInfoIter<'a> {
    type Item = InputInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;

        let model = &self.net.0.inner.model();
        let fact = model.input_fact(id).expect("`input_fact` returned error");

        let node = model.input_outlets().unwrap()[id].node;

        Some(InputInfo {
            shape: fact
                .shape
                .as_concrete()
                .expect("network input shape must be concrete"),
            name: &model.node(node).name,
        })
    }
}

/// Information about a neural network input node.
#[derive(Debug)]
pub struct InputInfo<'a> {
    shape: &'a [usize],
    name: &'a str,
}

impl<'a> InputInfo<'a> {
    /// Returns the tensor shape for this input.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.shape
    }

    /// Returns the name of this input.
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }
}

/// Iterator over a [`NeuralNetwork`]s output node information.
pub struct OutputInfoIter<'a> {
    net: &'a NeuralNetwork,
    ids: Range<usize>,
}

impl<'a> Iterator for OutputInfoIter<'a> {
    type Item = OutputInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;

        let model = &self.net.0.inner.model();
        let fact = model.output_fact(id).expect("`output_fact` returned error");

        let node = model.output_outlets().unwrap()[id].node;

        Some(OutputInfo {
            shape: fact
                .shape
                .as_concrete()
                .expect("network output shape must be concrete"),
            name: &model.node(node).name,
        })
    }
}

/// Information about a neural network output node.
#[derive(Debug)]
pub struct OutputInfo<'a> {
    shape: &'a [usize],
    name: &'a str,
}

impl<'a> OutputInfo<'a> {
    /// Returns the tensor shape for this output.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.shape
    }

    /// Returns the name of this output.
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over the output tensors.
    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

/// List of input tensors for neural network inference.
#[derive(Debug)]
pub struct Inputs {
    inner: TVec<Tensor>,
}

impl Inputs {
    /// Returns the number of input tensors stored in `self`.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl From<Tensor> for Inputs {
    fn from(t: Tensor) -> Self {
        Self { inner: tvec![t] }
    }
}

impl FromIterator<Tensor> for Inputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(1.0..=2.0);
        assert_eq!(mapper.map(Color::BLACK), [1.0, 1.0, 1.0]);
        assert_eq!(mapper.map(Color::WHITE), [2.0, 2.0, 2.0]);
    }
}
