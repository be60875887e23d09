//! Model category taxonomy.
//!
//! Every model file the library manages belongs to exactly one kind, and
//! each kind maps to one directory under the models root. Incoming kind
//! strings are normalized through a small alias table before validation;
//! workflow type hints use a separate, wider table.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A model-file category, serialized as its directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Checkpoints,
    DiffusionModels,
    Loras,
    Vae,
    Controlnet,
    TextEncoders,
    Clip,
    ClipVision,
    Unet,
    UpscaleModels,
    Embeddings,
}

/// All model kinds, in scan order.
pub const ALL_KINDS: &[ModelKind] = &[
    ModelKind::Checkpoints,
    ModelKind::DiffusionModels,
    ModelKind::Loras,
    ModelKind::Vae,
    ModelKind::TextEncoders,
    ModelKind::Clip,
    ModelKind::ClipVision,
    ModelKind::Controlnet,
    ModelKind::UpscaleModels,
    ModelKind::Embeddings,
    ModelKind::Unet,
];

/// Known spellings that normalize to a canonical kind.
const KIND_ALIASES: &[(&str, ModelKind)] = &[
    ("checkpoint", ModelKind::Checkpoints),
    ("ckpt", ModelKind::Checkpoints),
    ("lora", ModelKind::Loras),
    ("text_encoder", ModelKind::TextEncoders),
    ("diffusion", ModelKind::DiffusionModels),
];

impl ModelKind {
    /// Directory name for this kind (also its serialized form).
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Checkpoints => "checkpoints",
            Self::DiffusionModels => "diffusion_models",
            Self::Loras => "loras",
            Self::Vae => "vae",
            Self::Controlnet => "controlnet",
            Self::TextEncoders => "text_encoders",
            Self::Clip => "clip",
            Self::ClipVision => "clip_vision",
            Self::Unet => "unet",
            Self::UpscaleModels => "upscale_models",
            Self::Embeddings => "embeddings",
        }
    }

    /// Parse a user-supplied kind string, normalizing known aliases.
    ///
    /// Returns `None` for anything outside the fixed category set.
    pub fn parse(value: &str) -> Option<Self> {
        let k = value.trim().to_lowercase();
        if let Some((_, kind)) = KIND_ALIASES.iter().find(|(alias, _)| *alias == k) {
            return Some(*kind);
        }
        ALL_KINDS.iter().copied().find(|kind| kind.dir_name() == k)
    }

    /// Like [`parse`](Self::parse), but surfaces a validation error.
    pub fn parse_required(value: &str) -> Result<Self, CoreError> {
        Self::parse(value).ok_or_else(|| CoreError::Validation("invalid kind".to_string()))
    }

    /// Map a workflow type hint to a kind.
    ///
    /// Hints are a looser vocabulary than kind strings: "unknown" (and
    /// anything unrecognized) maps to `None` rather than an error, since
    /// a hint is advisory.
    pub fn from_type_hint(hint: &str) -> Option<Self> {
        let h = hint.trim().to_lowercase();
        match h.as_str() {
            "checkpoint" => Some(Self::Checkpoints),
            "diffusion" | "diffusion_models" => Some(Self::DiffusionModels),
            "lora" => Some(Self::Loras),
            "vae" => Some(Self::Vae),
            "controlnet" => Some(Self::Controlnet),
            "upscale_models" => Some(Self::UpscaleModels),
            "clip" => Some(Self::Clip),
            "clip_vision" => Some(Self::ClipVision),
            "text_encoder" | "text_encoders" => Some(Self::TextEncoders),
            "unet" => Some(Self::Unet),
            "embeddings" => Some(Self::Embeddings),
            _ => None,
        }
    }

    /// Kinds worth scanning for a given type hint when looking for
    /// on-disk candidates. Unrecognized hints scan everything.
    pub fn scan_kinds_for_hint(hint: &str) -> &'static [ModelKind] {
        match hint.trim().to_lowercase().as_str() {
            "checkpoint" => &[ModelKind::Checkpoints, ModelKind::DiffusionModels],
            "lora" => &[ModelKind::Loras],
            "vae" => &[ModelKind::Vae],
            _ => ALL_KINDS,
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
