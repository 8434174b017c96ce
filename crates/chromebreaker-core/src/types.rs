//! Common types used across ChromeBreaker
//!
//! The resource-type catalogue maps the numeric file-type codes found in
//! archive logical entries to engine names, display names and versions.

use serde::{Deserialize, Serialize};

/// Resource type codes carried in bits 16..24 of a logical entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ResourceType {
    Invalid = 0,
    Mesh = 16,
    MeshFixups = 17,
    Skin = 18,
    Model = 24,
    Texture = 32,
    TextureBitmapData = 33,
    TextureMipBitmapData = 34,
    Material = 48,
    Shader = 49,
    Animation = 64,
    AnimationStream = 65,
    AnimationScr = 66,
    AnimationScrFixups = 67,
    Anm2Header = 68,
    Anm2Payload = 69,
    Anm2Fallback = 70,
    AnimGraphBank = 71,
    AnimGraphBankFixups = 72,
    AnimCustomResource = 73,
    AnimCustomResourceFixups = 74,
    GpuFx = 81,
    EnvprobeBin = 85,
    VoxelizerBin = 86,
    Area = 90,
    PrefabText = 96,
    Prefab = 97,
    PrefabFixups = 98,
    Sound = 101,
    Music = 102,
    Speech = 103,
    SfxStream = 104,
    SfxLocal = 105,
    VertexData = 240,
    IndexData = 241,
    GeometryData = 242,
    ClothData = 243,
    TinyObjects = 248,
    BuilderInformation = 255,
}

/// Static metadata for one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTypeInfo {
    pub id: ResourceType,
    /// Engine enum name, e.g. `EResType::Mesh`
    pub name: &'static str,
    pub long_name: &'static str,
    pub short_name: &'static str,
    /// Name used for output directories
    pub pretty_name: &'static str,
    pub mem_category: u16,
    pub version: u16,
}

macro_rules! res_type {
    ($id:ident, $long:literal, $short:literal, $pretty:literal, $mem:literal, $ver:literal) => {
        ResourceTypeInfo {
            id: ResourceType::$id,
            name: concat!("EResType::", $pretty),
            long_name: $long,
            short_name: $short,
            pretty_name: $pretty,
            mem_category: $mem,
            version: $ver,
        }
    };
}

static RESOURCE_TYPES: &[ResourceTypeInfo] = &[
    res_type!(Invalid, "_INVALID_", "INVALID", "Invalid", 0, 1),
    res_type!(Mesh, "_MESH_", "MESH", "Mesh", 84, 60),
    res_type!(MeshFixups, "_MESH_FIXUPS_", "MESH_FIX", "MeshFixups", 84, 60),
    res_type!(Skin, "_SKIN_", "SKIN", "Skin", 85, 13),
    res_type!(Model, "_MODEL_", "MODEL", "Model", 83, 3),
    res_type!(Texture, "_TEXTURE_", "TEXTURE", "Texture", 109, 11),
    res_type!(TextureBitmapData, "_TEXTURE_BITMAP_DATA_", "BITMAP", "TextureBitmapData", 116, 11),
    res_type!(TextureMipBitmapData, "_TEXTURE_MIP_BITMAP_DATA_", "STRMBMP", "TextureMipBitmapData", 116, 11),
    res_type!(Material, "_MATERIAL_", "MATERIAL", "Material", 82, 13),
    res_type!(Shader, "_SHADER_", "SHADER", "Shader", 114, 13),
    res_type!(Animation, "_ANIMATION_", "ANIM", "Animation", 5, 4),
    res_type!(AnimationStream, "_ANIMATION_STREAM_", "ANIMSTRM", "AnimationStream", 5, 4),
    res_type!(AnimationScr, "_ANIMATION_SCR_", "ANIMSCR", "AnimationScr", 8, 4),
    res_type!(AnimationScrFixups, "_ANIMATION_SCRFIXUPS_", "ANIMSFIX", "AnimationScrFixups", 8, 4),
    res_type!(Anm2Header, "_ANM2_METADATA_", "ANM_META", "ANM2Header", 5, 2),
    res_type!(Anm2Payload, "_ANM2_PAYLOAD_", "ANM_DATA", "ANM2Payload", 5, 2),
    res_type!(Anm2Fallback, "_ANM2_FALLBACK_", "ANM_FLBK", "ANM2Fallback", 5, 2),
    res_type!(AnimGraphBank, "_ANIM_GRAPH_BANK_", "ANMGRAPH", "AnimGraphBank", 11, 140),
    res_type!(AnimGraphBankFixups, "_ANIM_GRAPH_BANK_FIXUPS_", "AGRPHFIX", "AnimGraphBankFixups", 11, 140),
    res_type!(AnimCustomResource, "_ANIM_CUSTOM_RESOURCE_", "ACSTMRES", "AnimCustomResource", 14, 4),
    res_type!(AnimCustomResourceFixups, "_ANIM_CUSTOM_RESOURCE_FIXUPS_", "ACRESFIX", "AnimCustomResourceFixups", 14, 4),
    res_type!(GpuFx, "_GPUFX_", "GPUFX", "GpuFx", 178, 2),
    res_type!(EnvprobeBin, "_ENV_BIN_", "ENV_BIN", "EnvprobeBin", 77, 2),
    res_type!(VoxelizerBin, "_VXL_BIN_", "VXL_BIN", "VoxelizerBin", 77, 2),
    res_type!(Area, "_AREA_", "AREA", "Area", 122, 2),
    res_type!(PrefabText, "_PREFAB_TEXT_", "PRFBTXT", "PrefabText", 148, 2),
    res_type!(Prefab, "_PREFAB_", "PREFAB", "Prefab", 148, 8),
    res_type!(PrefabFixups, "_PREFAB_DATA_FIXUPS_", "PRFBFXUP", "PrefabFixUps", 148, 8),
    res_type!(Sound, "_SOUND_", "SOUND", "Sound", 18, 2),
    res_type!(Music, "_SOUND_MUSIC_", "MUSIC", "Music", 18, 2),
    res_type!(Speech, "_SOUND_SPEECH_", "SPEECH", "Speech", 18, 2),
    res_type!(SfxStream, "_SOUND_STREAM_", "SNDSTRM", "SFX_stream", 18, 2),
    res_type!(SfxLocal, "_SOUND_LOCAL_", "SNDLOCAL", "SFX_local", 18, 2),
    res_type!(VertexData, "_VERTEX_DATA_", "VERTEXES", "VertexData", 115, 5),
    res_type!(IndexData, "_INDEX_DATA_", "INDEXES", "IndexData", 115, 4),
    res_type!(GeometryData, "_GEOMETRY_DATA_", "GEOMETRY", "GeometryData", 115, 4),
    res_type!(ClothData, "_CLOTH_DATA_", "CLOTH", "ClothData", 115, 2),
    res_type!(TinyObjects, "_TINY_OBJECTS_", "TINYOBJS", "TinyObjects", 75, 8),
    res_type!(BuilderInformation, "_BUILDER_INFORMATION_", "BUILDER", "BuilderInformation", 107, 2),
];

impl ResourceType {
    /// Map a raw file-type code; unknown codes become `Invalid`
    pub fn from_code(code: u32) -> Self {
        RESOURCE_TYPES
            .iter()
            .find(|info| info.id as u32 == code)
            .map_or(ResourceType::Invalid, |info| info.id)
    }

    /// Look a type up by its engine name (`EResType::Mesh`), case-insensitive
    pub fn from_name(name: &str) -> Self {
        RESOURCE_TYPES
            .iter()
            .find(|info| info.name.eq_ignore_ascii_case(name))
            .map_or(ResourceType::Invalid, |info| info.id)
    }

    /// Numeric code
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Catalogue entry for this type
    pub fn info(self) -> &'static ResourceTypeInfo {
        // Every variant has a row; Invalid is the first one.
        RESOURCE_TYPES
            .iter()
            .find(|info| info.id == self)
            .unwrap_or(&RESOURCE_TYPES[0])
    }

    /// Display name used for output directory naming
    pub fn pretty_name(self) -> &'static str {
        self.info().pretty_name
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info().name)
    }
}

/// Full catalogue, in code order
pub fn resource_types() -> &'static [ResourceTypeInfo] {
    RESOURCE_TYPES
}
