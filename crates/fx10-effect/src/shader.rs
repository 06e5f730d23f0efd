//! Shader reflection and the per-shader data an effect keeps.

use fx10_dxbc::{DxbcFile, FourCC, ShaderInputType, SignatureEntry};

use crate::device::{ShaderHandle, ShaderStage};
use crate::error::EffectError;
use crate::stream_output::StreamOutputDeclaration;

/// A resource a shader reads, as reported by reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundResource {
    /// Name of the effect variable or buffer backing the resource.
    pub name: String,
    /// Resource kind.
    pub input_type: ShaderInputType,
    /// First slot.
    pub bind_point: u32,
    /// Number of consecutive slots.
    pub bind_count: u32,
}

/// `D3D10_SIGNATURE_PARAMETER_DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParameterDesc {
    /// Semantic name.
    pub semantic_name: String,
    /// Semantic index.
    pub semantic_index: u32,
    /// Register index.
    pub register: u32,
    /// `D3D10_NAME` system value.
    pub system_value_type: u32,
    /// `D3D10_REGISTER_COMPONENT_TYPE`.
    pub component_type: u32,
    /// Components present in the register.
    pub mask: u8,
    /// Components actually read or written.
    pub read_write_mask: u8,
}

impl From<&SignatureEntry> for SignatureParameterDesc {
    fn from(entry: &SignatureEntry) -> Self {
        Self {
            semantic_name: entry.semantic_name.clone(),
            semantic_index: entry.semantic_index,
            register: entry.register,
            system_value_type: entry.system_value_type,
            component_type: entry.component_type,
            mask: entry.mask,
            read_write_mask: entry.read_write_mask,
        }
    }
}

/// What an effect needs to know about a shader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    /// Resources in binding order.
    pub bound_resources: Vec<BoundResource>,
    /// Input signature.
    pub inputs: Vec<SignatureParameterDesc>,
    /// Output signature.
    pub outputs: Vec<SignatureParameterDesc>,
}

/// Reflects compiled shader bytecode.
pub trait ShaderReflector: Send + Sync {
    /// Returns the bound resources and signatures of `bytecode`.
    fn reflect(&self, bytecode: &[u8]) -> Result<ShaderReflection, EffectError>;
}

/// Reads reflection data from the `RDEF`, `ISGN` and `OSGN` chunks of a shader container.
#[derive(Debug, Default, Clone, Copy)]
pub struct DxbcReflector;

impl ShaderReflector for DxbcReflector {
    fn reflect(&self, bytecode: &[u8]) -> Result<ShaderReflection, EffectError> {
        let file = DxbcFile::parse(bytecode)?;

        let bound_resources = match file.get_rdef() {
            Some(rdef) => rdef
                .map_err(|e| EffectError::Reflection(format!("RDEF: {e}")))?
                .bound_resources
                .into_iter()
                .map(|r| BoundResource {
                    name: r.name,
                    input_type: r.input_type,
                    bind_point: r.bind_point,
                    bind_count: r.bind_count,
                })
                .collect(),
            None => Vec::new(),
        };
        let signature = |kind| -> Result<Vec<SignatureParameterDesc>, EffectError> {
            Ok(match file.get_signature(kind) {
                Some(chunk) => chunk
                    .map_err(|e| EffectError::Reflection(format!("{kind}: {e}")))?
                    .entries
                    .iter()
                    .map(SignatureParameterDesc::from)
                    .collect(),
                None => Vec::new(),
            })
        };

        Ok(ShaderReflection {
            bound_resources,
            inputs: signature(FourCC::ISGN)?,
            outputs: signature(FourCC::OSGN)?,
        })
    }
}

/// Extracts the input signature of a shader as a standalone one-chunk container.
pub(crate) fn extract_input_signature(bytecode: &[u8]) -> Option<Vec<u8>> {
    let file = DxbcFile::parse(bytecode).ok()?;
    let chunk = file.get_chunk(FourCC::ISGN)?;
    fx10_dxbc::write_container(&[(FourCC::ISGN, chunk.data)]).ok()
}

/// Where a reflected resource is found at apply time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceTarget {
    /// A constant or texture buffer, by index in its owner's buffer list.
    Buffer(crate::variable::Owner, usize),
    /// A texture or sampler variable.
    Variable(crate::variable::VarLoc),
}

/// One reflected resource binding resolved against the effect namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResourceBinding {
    pub(crate) input_type: ShaderInputType,
    pub(crate) bind_point: u32,
    pub(crate) bind_count: u32,
    pub(crate) target: ResourceTarget,
}

/// A shader owned by an effect variable (named or inline).
#[derive(Debug)]
pub(crate) struct ShaderPayload {
    pub(crate) stage: ShaderStage,
    /// `None` is the null shader.
    pub(crate) shader: Option<ShaderHandle>,
    pub(crate) is_inline: bool,
    /// Dropped by `optimize`.
    pub(crate) bytecode: Option<Vec<u8>>,
    /// Dropped by `optimize`.
    pub(crate) reflection: Option<ShaderReflection>,
    pub(crate) input_signature: Option<Vec<u8>>,
    pub(crate) stream_output: Option<(String, StreamOutputDeclaration)>,
    pub(crate) resources: Vec<ResourceBinding>,
}

impl ShaderPayload {
    pub(crate) fn null(stage: ShaderStage, is_inline: bool) -> Self {
        Self {
            stage,
            shader: None,
            is_inline,
            bytecode: None,
            reflection: None,
            input_signature: None,
            stream_output: None,
            resources: Vec::new(),
        }
    }
}

/// `D3D10_EFFECT_SHADER_DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectShaderDesc {
    /// Input signature as a one-chunk container; survives `optimize`.
    pub input_signature: Option<Vec<u8>>,
    /// `true` for shaders compiled inline in a pass.
    pub is_inline: bool,
    /// Shader bytecode; `None` once the effect is optimized or for the null shader.
    pub bytecode: Option<Vec<u8>>,
    /// Stream-output declaration for geometry shaders that have one.
    pub stream_output_declaration: Option<String>,
    /// Number of input signature entries.
    pub input_parameters: u32,
    /// Number of output signature entries.
    pub output_parameters: u32,
}

impl ShaderPayload {
    pub(crate) fn desc(&self) -> EffectShaderDesc {
        let (inputs, outputs) = self
            .reflection
            .as_ref()
            .map_or((0, 0), |r| (r.inputs.len() as u32, r.outputs.len() as u32));
        EffectShaderDesc {
            input_signature: self.input_signature.clone(),
            is_inline: self.is_inline,
            bytecode: self.bytecode.clone(),
            stream_output_declaration: self.stream_output.as_ref().map(|(decl, _)| decl.clone()),
            input_parameters: inputs,
            output_parameters: outputs,
        }
    }
}
