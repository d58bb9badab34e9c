use std::fmt;

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    /// Prefix used for every generated identifier belonging to this stage.
    pub fn prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderVersion {
    pub stage: ShaderStage,
    pub major: u8,
    pub minor: u8,
}

impl ShaderVersion {
    pub fn new(stage: ShaderStage, major: u8, minor: u8) -> Self {
        Self {
            stage,
            major,
            minor,
        }
    }

    /// `true` when this version is at least `major.minor`. The `2.x` extended profiles encode
    /// their minor version as `1`, so `at_least(2, 1)` selects `vs_2_x`/`ps_2_x` and newer.
    pub fn at_least(&self, major: u8, minor: u8) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    pub fn is_vertex(&self) -> bool {
        self.stage == ShaderStage::Vertex
    }

    pub fn is_pixel(&self) -> bool {
        self.stage == ShaderStage::Pixel
    }

    /// Pixel shader models 1.0 through 1.4.
    pub fn is_legacy_pixel(&self) -> bool {
        self.is_pixel() && self.major < 2
    }
}

impl fmt::Display for ShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.major == 2 && self.minor == 1 {
            write!(f, "{}_2_x", self.stage.prefix())
        } else {
            write!(f, "{}_{}_{}", self.stage.prefix(), self.major, self.minor)
        }
    }
}

/// The closed set of register kinds. Numeric aliases in the encoding (address vs texture,
/// texcoord-output vs generic output) are already resolved by the time a value of this type
/// exists, and the four float-constant banks are folded into [`RegisterKind::Const`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterKind {
    Temp,
    Input,
    Const,
    Address,
    Texture,
    RastOut,
    AttrOut,
    TexCrdOut,
    Output,
    ConstInt,
    ColorOut,
    DepthOut,
    Sampler,
    ConstBool,
    Loop,
    MiscType,
    Label,
    Predicate,
}

impl RegisterKind {
    /// Register kinds that only have one meaningful lane.
    pub fn is_scalar(self, stage: ShaderStage, index: u32) -> bool {
        match self {
            RegisterKind::RastOut => index == RASTOUT_FOG || index == RASTOUT_POINT_SIZE,
            RegisterKind::DepthOut | RegisterKind::ConstBool | RegisterKind::Loop => true,
            RegisterKind::MiscType => index == MISCTYPE_FACE,
            RegisterKind::Predicate => stage == ShaderStage::Pixel,
            _ => false,
        }
    }

    pub fn is_constant(self) -> bool {
        matches!(
            self,
            RegisterKind::Const | RegisterKind::ConstInt | RegisterKind::ConstBool
        )
    }

    pub fn is_output(self) -> bool {
        matches!(
            self,
            RegisterKind::RastOut
                | RegisterKind::AttrOut
                | RegisterKind::TexCrdOut
                | RegisterKind::Output
                | RegisterKind::ColorOut
                | RegisterKind::DepthOut
        )
    }

    /// Assembly-style register name, e.g. `r`, `oPos`, `vFace`.
    pub fn asm_name(self, index: u32) -> String {
        match self {
            RegisterKind::Temp => format!("r{index}"),
            RegisterKind::Input => format!("v{index}"),
            RegisterKind::Const => format!("c{index}"),
            RegisterKind::Address => format!("a{index}"),
            RegisterKind::Texture => format!("t{index}"),
            RegisterKind::RastOut => match index {
                RASTOUT_POSITION => "oPos".to_owned(),
                RASTOUT_FOG => "oFog".to_owned(),
                _ => "oPts".to_owned(),
            },
            RegisterKind::AttrOut => format!("oD{index}"),
            RegisterKind::TexCrdOut => format!("oT{index}"),
            RegisterKind::Output => format!("o{index}"),
            RegisterKind::ConstInt => format!("i{index}"),
            RegisterKind::ColorOut => format!("oC{index}"),
            RegisterKind::DepthOut => "oDepth".to_owned(),
            RegisterKind::Sampler => format!("s{index}"),
            RegisterKind::ConstBool => format!("b{index}"),
            RegisterKind::Loop => "aL".to_owned(),
            RegisterKind::MiscType => match index {
                MISCTYPE_POSITION => "vPos".to_owned(),
                _ => "vFace".to_owned(),
            },
            RegisterKind::Label => format!("l{index}"),
            RegisterKind::Predicate => format!("p{index}"),
        }
    }
}

pub const RASTOUT_POSITION: u32 = 0;
pub const RASTOUT_FOG: u32 = 1;
pub const RASTOUT_POINT_SIZE: u32 = 2;

pub const MISCTYPE_POSITION: u32 = 0;
pub const MISCTYPE_FACE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register {
    pub kind: RegisterKind,
    pub index: u32,
}

impl Register {
    pub fn new(kind: RegisterKind, index: u32) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind.asm_name(self.index))
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WriteMask: u8 {
        const X = 0b0001;
        const Y = 0b0010;
        const Z = 0b0100;
        const W = 0b1000;
        const XY = Self::X.bits() | Self::Y.bits();
        const XYZ = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
        const XYZW = Self::X.bits() | Self::Y.bits() | Self::Z.bits() | Self::W.bits();
    }
}

impl WriteMask {
    pub fn contains_lane(self, lane: Component) -> bool {
        self.bits() & (1 << lane.index()) != 0
    }

    /// Enabled lanes in `xyzw` order.
    pub fn lanes(self) -> impl Iterator<Item = Component> {
        Component::ALL
            .into_iter()
            .filter(move |c| self.contains_lane(*c))
    }

    /// `.xz`-style suffix; empty for the full mask.
    pub fn suffix(self) -> String {
        if self == WriteMask::XYZW {
            return String::new();
        }
        let mut s = String::from(".");
        for lane in self.lanes() {
            s.push(lane.as_char());
        }
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    X,
    Y,
    Z,
    W,
}

impl Component {
    pub const ALL: [Component; 4] = [Component::X, Component::Y, Component::Z, Component::W];

    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => Component::X,
            1 => Component::Y,
            2 => Component::Z,
            _ => Component::W,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Component::X => 0,
            Component::Y => 1,
            Component::Z => 2,
            Component::W => 3,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Component::X => 'x',
            Component::Y => 'y',
            Component::Z => 'z',
            Component::W => 'w',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [Component; 4]);

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle(Component::ALL);

    pub fn replicate(c: Component) -> Self {
        Swizzle([c; 4])
    }

    pub fn from_bits(bits: u32) -> Self {
        Swizzle([
            Component::from_bits(bits),
            Component::from_bits(bits >> 2),
            Component::from_bits(bits >> 4),
            Component::from_bits(bits >> 6),
        ])
    }

    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }

    /// All four lanes read the same component.
    pub fn is_replicated(self) -> bool {
        self.0.iter().all(|c| *c == self.0[0])
    }

    /// `.xyzw`-style suffix; empty for the identity swizzle.
    pub fn suffix(self) -> String {
        if self.is_identity() {
            return String::new();
        }
        let mut s = String::from(".");
        for c in self.0 {
            s.push(c.as_char());
        }
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrcModifier {
    None,
    Negate,
    Bias,
    BiasNegate,
    Sign,
    SignNegate,
    Complement,
    X2,
    X2Negate,
    DivideByZ,
    DivideByW,
    Abs,
    AbsNegate,
    Not,
}

impl SrcModifier {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => SrcModifier::None,
            1 => SrcModifier::Negate,
            2 => SrcModifier::Bias,
            3 => SrcModifier::BiasNegate,
            4 => SrcModifier::Sign,
            5 => SrcModifier::SignNegate,
            6 => SrcModifier::Complement,
            7 => SrcModifier::X2,
            8 => SrcModifier::X2Negate,
            9 => SrcModifier::DivideByZ,
            10 => SrcModifier::DivideByW,
            11 => SrcModifier::Abs,
            12 => SrcModifier::AbsNegate,
            13 => SrcModifier::Not,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            SrcModifier::None => "none",
            SrcModifier::Negate => "neg",
            SrcModifier::Bias => "bias",
            SrcModifier::BiasNegate => "bias_neg",
            SrcModifier::Sign => "bx2",
            SrcModifier::SignNegate => "bx2_neg",
            SrcModifier::Complement => "comp",
            SrcModifier::X2 => "x2",
            SrcModifier::X2Negate => "x2_neg",
            SrcModifier::DivideByZ => "dz",
            SrcModifier::DivideByW => "dw",
            SrcModifier::Abs => "abs",
            SrcModifier::AbsNegate => "abs_neg",
            SrcModifier::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShift {
    None,
    Mul2,
    Mul4,
    Mul8,
    Div2,
    Div4,
    Div8,
}

impl ResultShift {
    /// Decodes the signed 4-bit shift-scale field of a destination token.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw & 0xF {
            0 => ResultShift::None,
            1 => ResultShift::Mul2,
            2 => ResultShift::Mul4,
            3 => ResultShift::Mul8,
            13 => ResultShift::Div8,
            14 => ResultShift::Div4,
            15 => ResultShift::Div2,
            _ => return None,
        })
    }

    pub fn factor(self) -> Option<&'static str> {
        match self {
            ResultShift::None => None,
            ResultShift::Mul2 => Some("2.0"),
            ResultShift::Mul4 => Some("4.0"),
            ResultShift::Mul8 => Some("8.0"),
            ResultShift::Div2 => Some("0.5"),
            ResultShift::Div4 => Some("0.25"),
            ResultShift::Div8 => Some("0.125"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeAddress {
    pub reg: Register,
    pub component: Component,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstOperand {
    pub reg: Register,
    pub mask: WriteMask,
    pub saturate: bool,
    pub partial_precision: bool,
    pub centroid: bool,
    pub shift: ResultShift,
    pub relative: Option<RelativeAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrcOperand {
    pub reg: Register,
    pub swizzle: Swizzle,
    pub modifier: SrcModifier,
    pub relative: Option<RelativeAddress>,
}

impl SrcOperand {
    /// The component read by lane 0, used by scalar consumers.
    pub fn scalar_component(&self) -> Component {
        self.swizzle.0[0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Usage {
    Position,
    BlendWeight,
    BlendIndices,
    Normal,
    PointSize,
    TexCoord,
    Tangent,
    Binormal,
    TessFactor,
    PositionT,
    Color,
    Fog,
    Depth,
    Sample,
}

impl Usage {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Usage::Position,
            1 => Usage::BlendWeight,
            2 => Usage::BlendIndices,
            3 => Usage::Normal,
            4 => Usage::PointSize,
            5 => Usage::TexCoord,
            6 => Usage::Tangent,
            7 => Usage::Binormal,
            8 => Usage::TessFactor,
            9 => Usage::PositionT,
            10 => Usage::Color,
            11 => Usage::Fog,
            12 => Usage::Depth,
            13 => Usage::Sample,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Usage::Position => "position",
            Usage::BlendWeight => "blendweight",
            Usage::BlendIndices => "blendindices",
            Usage::Normal => "normal",
            Usage::PointSize => "psize",
            Usage::TexCoord => "texcoord",
            Usage::Tangent => "tangent",
            Usage::Binormal => "binormal",
            Usage::TessFactor => "tessfactor",
            Usage::PositionT => "positiont",
            Usage::Color => "color",
            Usage::Fog => "fog",
            Usage::Depth => "depth",
            Usage::Sample => "sample",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureType {
    Texture1D,
    Texture2D,
    TextureCube,
    Texture3D,
}

impl TextureType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => TextureType::Texture1D,
            2 => TextureType::Texture2D,
            3 => TextureType::TextureCube,
            4 => TextureType::Texture3D,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureType::Texture1D => "1d",
            TextureType::Texture2D => "2d",
            TextureType::TextureCube => "cube",
            TextureType::Texture3D => "volume",
        }
    }
}

/// Declaration carried by a `dcl` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    Usage { usage: Usage, index: u32 },
    Sampler(TextureType),
    /// Registers whose `dcl` carries no semantic (ps 2.x `t#`/`v#`, ps 3.0 `vPos`/`vFace`).
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralValue {
    Float([f32; 4]),
    Int([i32; 4]),
    Bool(bool),
}

impl LiteralValue {
    pub fn kind(&self) -> RegisterKind {
        match self {
            LiteralValue::Float(_) => RegisterKind::Const,
            LiteralValue::Int(_) => RegisterKind::ConstInt,
            LiteralValue::Bool(_) => RegisterKind::ConstBool,
        }
    }
}

/// Comparison selected by the control field of `ifc`, `breakc` and `setp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Eq,
    Ge,
    Lt,
    Ne,
    Le,
}

impl Comparison {
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => Comparison::Gt,
            2 => Comparison::Eq,
            3 => Comparison::Ge,
            4 => Comparison::Lt,
            5 => Comparison::Ne,
            6 => Comparison::Le,
            _ => return None,
        })
    }

    pub fn operator(self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Eq => "==",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Ne => "!=",
            Comparison::Le => "<=",
        }
    }
}
